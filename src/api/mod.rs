pub mod handlers;

pub use handlers::{
    export_invoices, health_check, import_clients, import_invoices, preview_clients,
    preview_invoices,
};
