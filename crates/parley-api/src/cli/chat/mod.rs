//! Interactive chat over the real-time channel.
//!
//! The loop activates one session through the session synchronizer, prints
//! its history, then interleaves typed input, live room events and
//! connection notices. Entry point: `loop_runner::run_chat_loop`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod renderer;
