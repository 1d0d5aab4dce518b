pub mod approval;
pub mod company;
pub mod quote;
