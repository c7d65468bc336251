mod column_filter;
mod country_picker;
mod edit_modal;
mod input;
mod key_result;
mod search_input;
mod toast;

pub use column_filter::{ColumnFilter, FilterEvent};
pub use edit_modal::{EditEvent, EditModal};
pub use key_result::KeyResult;
pub use search_input::{SearchEvent, SearchInput};
pub use toast::{Toast, ToastKind};
