//! Effects produced while handling a packet or a fired timer

use crate::names::strip_colours;
use log::info;
use shared::Outbound;
use std::time::Duration;

/// Delayed callbacks; tokens let the session discard ones that were superseded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// Player spawned at the pit start point and may be entered once the registry has caught up
    PitSettle { player_id: u8, token: u64 },
    /// Clear the pit lane speed limit message for everyone
    ClearSpeedMessage { token: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(Outbound),
    Schedule { delay: Duration, timer: Timer },
}

pub fn command(out: &mut Vec<Effect>, text: String) {
    out.push(Effect::Send(Outbound::Command(text)));
}

/// Logs a message to the console and shows it on the host's screen
pub fn message(out: &mut Vec<Effect>, text: String) {
    info!("{}", strip_colours(&text));
    out.push(Effect::Send(Outbound::LocalMessage(text)));
}

pub fn schedule(out: &mut Vec<Effect>, delay: Duration, timer: Timer) {
    out.push(Effect::Schedule { delay, timer });
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Outbound effects only, in the order they were produced
    pub(crate) fn outbound(effects: &[Effect]) -> Vec<Outbound> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Send(outbound) => Some(outbound.clone()),
                Effect::Schedule { .. } => None,
            })
            .collect()
    }

    /// Administrative commands only
    pub(crate) fn commands(effects: &[Effect]) -> Vec<String> {
        outbound(effects)
            .into_iter()
            .filter_map(|outbound| match outbound {
                Outbound::Command(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_commands_skip_messages_and_timers() {
        let mut out = Vec::new();
        message(&mut out, "^1Racer^8 entered the pit lane".to_string());
        command(&mut out, "/p_dt racer".to_string());
        let timer = Timer::ClearSpeedMessage { token: 1 };
        schedule(&mut out, Duration::from_millis(10), timer);

        assert_eq!(outbound(&out).len(), 2);
        assert_eq!(commands(&out), vec!["/p_dt racer"]);
    }
}
