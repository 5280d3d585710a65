//! Data models for Pustaka

pub mod book;
pub mod enums;
pub mod loan;
pub mod notification;
pub mod payment;
pub mod user;

// Re-export commonly used types
pub use book::Book;
pub use enums::{FinePaymentStatus, LoanStatus, PaymentMethod, UserRole};
pub use loan::{Loan, LoanDetails};
pub use notification::Notification;
pub use payment::FinePaymentBatch;
pub use user::{User, UserShort};
