pub mod load;
pub mod save;

pub use load::{export_data, get_form_data, get_history_data, get_table_data, load_all};
pub use save::save_form_data;
