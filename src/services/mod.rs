pub mod mailer;
pub mod payments;
pub mod ratings;

pub use mailer::{LogMailer, Mailer, MailerError, Recipient};
pub use payments::{CheckoutRequest, LineItem, PaymentError, PaymentGateway, StripeGateway};
