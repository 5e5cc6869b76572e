pub mod sheet_store;
pub mod sheets_client;

pub use sheet_store::SheetStore;
pub use sheets_client::{ServiceAccountAuth, SheetsClient};
