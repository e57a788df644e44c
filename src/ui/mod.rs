// UI module - console front-end for the scan service
//
// This module contains:
// - ConsoleController: reads commands from stdin and renders scan events
// - EventRenderer: formats ScanEvents as console lines
// - ProgressRenderer: live progress from the state change broadcast
// - Command: parsed console input

pub mod console;

pub use console::{
    Command, CommandError, ConsoleController, EventRenderer, Flow, ProgressRenderer, READY_LINE,
};
