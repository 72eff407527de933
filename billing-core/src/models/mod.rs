pub mod client;
pub mod invoice;
pub mod payment;
pub mod task;

pub use client::{Client, ServiceType};
pub use invoice::{Invoice, InvoiceItem, InvoiceStatus};
pub use payment::Payment;
pub use task::{BillableTask, Task, TaskStatus};
