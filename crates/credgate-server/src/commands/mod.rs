pub mod check;
pub mod ldap;
pub mod login;
pub mod providers;
pub mod register;
pub mod token;
