//! Client-side data-view engine
//!
//! Pure state and formatting logic for browsing a remote, paginated table.
//! Nothing in here talks to the network or the terminal: the controller
//! hands out load requests and takes completed responses back.

pub mod cell_formatter;
pub mod pagination;
pub mod query_state;
pub mod table_view;

pub use cell_formatter::{CellFormatter, CellKind, FormatOptions, RenderedCell};
pub use pagination::{NavigationOutcome, NavigationRejection, PageItem, PageStrip, PaginationController};
pub use query_state::{DatabaseId, QueryParams, QueryStateManager, SearchScope, SortOrder, ViewState};
pub use table_view::{
    HeaderCell, LoadOutcome, LoadPhase, LoadRequest, LoadTicket, Navigation, TableRender, TableViewController,
};
