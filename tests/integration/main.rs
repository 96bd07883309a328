//! Integration tests for tjoy-sequencer.

mod cli_commands;
mod profile_loading;
mod sequence_switching;
mod support;
