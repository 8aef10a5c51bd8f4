//! # Nudge Channels
//! Messenger implementations. The engine only sees the `Messenger` trait;
//! a real chat transport plugs in here.

pub mod console;

pub use console::ConsoleMessenger;
