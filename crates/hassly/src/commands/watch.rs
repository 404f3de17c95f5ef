//! `hassly watch`: stream client signals until interrupted.

use chrono::{Local, SecondsFormat};
use owo_colors::Style;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;

use hassly_core::{HubClient, HubSignal};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(client: &HubClient, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // Subscribe first so the connect and bootstrap signals are seen too.
    let mut signals = client.signals();
    client.connect().await?;

    let color = output::should_color(&global.color);
    let mut shown = 0usize;

    loop {
        let signal = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = signals.recv() => match received {
                Ok(signal) => signal,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "watch fell behind, signals dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };

        if !wanted(&signal, &args) {
            continue;
        }

        output::print_output(&render_signal(&global.output, &signal, color), global.quiet);

        shown += 1;
        if args.count.is_some_and(|n| shown >= n) {
            break;
        }
    }
    Ok(())
}

// ── Filtering ───────────────────────────────────────────────────────

fn wanted(signal: &HubSignal, args: &WatchArgs) -> bool {
    match signal {
        HubSignal::Ping | HubSignal::Pong => args.heartbeat,
        // Every state change also arrives as a plain event; show it once.
        HubSignal::StateChanged(change) => args
            .entity
            .as_deref()
            .is_some_and(|entity| change.entity_id == entity),
        HubSignal::Event(event) | HubSignal::CallService(event) => {
            if matches!(signal, HubSignal::Event(_)) && event.event_type == "call_service" {
                return false;
            }
            if args.entity.is_some() {
                return false;
            }
            args.event_type
                .as_deref()
                .is_none_or(|wanted| event.event_type == wanted)
        }
        _ => args.event_type.is_none() && args.entity.is_none(),
    }
}

// ── Rendering ───────────────────────────────────────────────────────

fn detail(signal: &HubSignal) -> String {
    match signal {
        HubSignal::Connected { version } => format!("version {}", version.as_deref().unwrap_or("unknown")),
        HubSignal::Devices(v) => format!("{} devices", v.len()),
        HubSignal::Entities(v) => format!("{} entities", v.len()),
        HubSignal::Areas(v) => format!("{} areas", v.len()),
        HubSignal::Labels(v) => format!("{} labels", v.len()),
        HubSignal::States(v) => format!("{} states", v.len()),
        HubSignal::Config(c) => c.location_name.clone().unwrap_or_default(),
        HubSignal::Services(s) => format!("{} domains", s.len()),
        HubSignal::Event(e) | HubSignal::CallService(e) => {
            format!("{} {}", e.event_type, output::render_json(&e.data, true))
        }
        HubSignal::StateChanged(change) => {
            let state = |s: Option<&hassly_core::State>| s.map_or_else(|| "-".to_owned(), |s| s.state.to_string());
            format!(
                "{}: {} -> {}",
                change.entity_id,
                state(change.old_state.as_ref()),
                state(change.new_state.as_ref())
            )
        }
        HubSignal::Error(message) => message.clone(),
        HubSignal::Disconnected { reason } => reason.clone(),
        HubSignal::SocketClosed { code, reason } => format!("{code} {reason}"),
        HubSignal::SocketOpened | HubSignal::Subscribed | HubSignal::Ping | HubSignal::Pong => String::new(),
    }
}

fn render_line(signal: &HubSignal, color: bool) -> String {
    let time = Local::now().format("%H:%M:%S%.3f").to_string();
    let style = match signal {
        HubSignal::Error(_) | HubSignal::Disconnected { .. } => Style::new().red().bold(),
        HubSignal::Event(_) | HubSignal::CallService(_) | HubSignal::StateChanged(_) => Style::new().cyan(),
        HubSignal::Ping | HubSignal::Pong => Style::new().dimmed(),
        _ => Style::new().green(),
    };
    format!(
        "{} {:<14} {}",
        output::paint(&time, Style::new().dimmed(), color),
        output::paint(signal.name(), style, color),
        detail(signal)
    )
}

fn render_signal(format: &OutputFormat, signal: &HubSignal, color: bool) -> String {
    match format {
        OutputFormat::Json => output::render_json(&to_json(signal), false),
        OutputFormat::JsonCompact => output::render_json(&to_json(signal), true),
        OutputFormat::Table | OutputFormat::Plain => render_line(signal, color),
    }
}

fn to_json(signal: &HubSignal) -> Value {
    let mut value = json!({
        "time": Local::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "signal": signal.name(),
    });
    let payload = match signal {
        HubSignal::Event(e) | HubSignal::CallService(e) => serde_json::to_value(e.as_ref()).ok(),
        HubSignal::StateChanged(change) => serde_json::to_value(change.as_ref()).ok(),
        _ => Some(Value::String(detail(signal))).filter(|v| v.as_str().is_some_and(|s| !s.is_empty())),
    };
    if let (Some(payload), Some(map)) = (payload, value.as_object_mut()) {
        map.insert("data".into(), payload);
    }
    value
}
