pub mod support;

mod codec;
mod provision;
