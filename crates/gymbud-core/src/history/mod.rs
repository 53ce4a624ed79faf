//! Session history: read-side projections, filtering and live views

mod filter;
mod selector;
mod view;

pub use filter::{filter_history, HistoryFilter};
pub use selector::{
    build_history_list, build_session_detail, load_history_list, load_session_detail,
};
pub use view::{HistoryContext, HistoryDetailView, HistoryListView, ViewState};
