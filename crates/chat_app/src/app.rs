use std::io::{self, BufRead};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use chat_core::{update, ChatState, Effect, Msg};
use chat_logging::{chat_debug, chat_info};
use chrono::Utc;

use crate::config::AppConfig;
use crate::effects::EffectRunner;
use crate::render::TranscriptRenderer;

const TICK: Duration = Duration::from_millis(75);
const QUIT_COMMAND: &str = "/quit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Line(String),
    Quit,
    Closed,
}

/// Result of one loop iteration.
struct Step {
    state: ChatState,
    effects: Vec<Effect>,
    /// A line arrived while a reply was still streaming.
    refused: bool,
    /// No further input will arrive.
    input_closed: bool,
}

/// Applies engine messages first, so a reply that finished during the same
/// tick no longer blocks the next line.
fn step(mut state: ChatState, engine_msgs: Vec<Msg>, input: Option<Input>) -> Step {
    let mut effects = Vec::new();
    let mut apply = |state: ChatState, msg: Msg| {
        let (next, new_effects) = update(state, msg);
        effects.extend(new_effects);
        next
    };

    for msg in engine_msgs {
        state = apply(state, msg);
    }

    let mut refused = false;
    let mut input_closed = false;
    match input {
        Some(Input::Line(line)) => {
            if state.is_loading() {
                refused = true;
            } else {
                state = apply(state, Msg::InputChanged(line));
                state = apply(state, Msg::SendClicked { at: Utc::now() });
            }
        }
        Some(Input::Quit) => {
            state = apply(state, Msg::ViewClosed);
            input_closed = true;
        }
        Some(Input::Closed) => input_closed = true,
        None => state = apply(state, Msg::Tick),
    }

    Step {
        state,
        effects,
        refused,
        input_closed,
    }
}

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let runner =
        EffectRunner::new(config.transport_settings()).context("starting the engine runtime")?;
    let mut renderer = TranscriptRenderer::new(io::stdout(), config.banner());
    let mut state = ChatState::new(config.mode);

    let (input_tx, input_rx) = mpsc::channel();
    spawn_stdin_reader(input_tx);

    renderer.render(&state.view())?;
    let mut input_open = true;

    loop {
        let input = if input_open {
            match input_rx.recv_timeout(TICK) {
                Ok(input) => Some(input),
                Err(mpsc::RecvTimeoutError::Timeout) => None,
                Err(mpsc::RecvTimeoutError::Disconnected) => Some(Input::Closed),
            }
        } else {
            // Nothing left to read; keep polling the engine at tick rate.
            thread::sleep(TICK);
            None
        };
        match &input {
            Some(Input::Quit) => chat_info!("quit requested"),
            Some(Input::Closed) => chat_debug!("stdin closed"),
            _ => {}
        }

        let outcome = step(state, runner.drain_events(), input);
        state = outcome.state;
        runner.enqueue(outcome.effects);
        if outcome.refused {
            renderer.notice("still waiting for the current reply")?;
        }
        if outcome.input_closed {
            input_open = false;
        }

        if state.consume_dirty() {
            renderer.render(&state.view())?;
        }

        if !input_open && !state.is_loading() {
            break;
        }
    }

    chat_info!("chat_app exiting");
    Ok(())
}

fn spawn_stdin_reader(input_tx: mpsc::Sender<Input>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let input = if line.trim() == QUIT_COMMAND {
                Input::Quit
            } else {
                Input::Line(line)
            };
            let quit = input == Input::Quit;
            if input_tx.send(input).is_err() || quit {
                return;
            }
        }
        let _ = input_tx.send(Input::Closed);
    });
}
