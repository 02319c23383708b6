pub mod invoice;
pub mod money;
pub mod product;
pub mod unit;

pub use invoice::{
    Invoice, InvoiceDetails, InvoiceLine, InvoiceLineDetail, InvoiceStatus, NewInvoice,
    NewInvoiceLine,
};
pub use money::Money;
pub use product::{EditProduct, NewProduct, Product, ProductSummary, StockFilter};
pub use unit::{StockUnit, UnitStatus};
