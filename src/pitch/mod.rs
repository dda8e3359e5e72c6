pub mod bend;
