//! CV content: the read contract against the store and the text cleanup applied
//! before anything is shown or printed.

pub mod handlers;
pub mod sanitize;
pub mod source;
