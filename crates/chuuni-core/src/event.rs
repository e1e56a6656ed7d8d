//! Built-in event keys emitted by the agent hooks.
//!
//! The daemon itself accepts any event key; this enum only exists so the CLI
//! can validate names typed by a user and map hook payloads to keys.

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;

/// A trigger category with its own cooldown and session limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChuuniEvent {
    TaskStart,
    Coding,
    BashRun,
    TestPass,
    TestFail,
    Error,
    TaskDone,
    PermissionPrompt,
    Thinking,
}

impl ChuuniEvent {
    /// Every built-in event, in display order.
    pub const ALL: [ChuuniEvent; 9] = [
        ChuuniEvent::TaskStart,
        ChuuniEvent::Coding,
        ChuuniEvent::BashRun,
        ChuuniEvent::TestPass,
        ChuuniEvent::TestFail,
        ChuuniEvent::Error,
        ChuuniEvent::TaskDone,
        ChuuniEvent::PermissionPrompt,
        ChuuniEvent::Thinking,
    ];

    /// The wire/file-name form of the event key.
    pub fn as_str(self) -> &'static str {
        match self {
            ChuuniEvent::TaskStart => "task_start",
            ChuuniEvent::Coding => "coding",
            ChuuniEvent::BashRun => "bash_run",
            ChuuniEvent::TestPass => "test_pass",
            ChuuniEvent::TestFail => "test_fail",
            ChuuniEvent::Error => "error",
            ChuuniEvent::TaskDone => "task_done",
            ChuuniEvent::PermissionPrompt => "permission_prompt",
            ChuuniEvent::Thinking => "thinking",
        }
    }

    /// Built-in voice lines printed alongside a clip.
    pub fn lines(self) -> &'static [&'static str] {
        match self {
            ChuuniEvent::TaskStart => &["参る！", "いくぞ、全力で！", "我が力、解放する時が来た…"],
            ChuuniEvent::Coding => &[
                "コードよ…俺の意志に従え！",
                "この指先から、世界を書き換える",
                "フハハ！創造の時だ！",
            ],
            ChuuniEvent::BashRun => &[
                "シェルよ、我が命令を刻め！",
                "全システム、起動せよ！",
                "いくぞ…！覚悟しろ！",
            ],
            ChuuniEvent::TestPass => &[
                "完璧だ…！全てが意図通りに…！",
                "フハハ！テストは俺の前に跪いた！",
                "この力…本物だった",
            ],
            ChuuniEvent::TestFail => &[
                "くっ…テストに阻まれるとは…",
                "バグよ…お前の存在を許さぬ！",
                "まだだ…まだ終わらぬ！",
            ],
            ChuuniEvent::Error => &[
                "くっ…予想外の敵か",
                "ぐっ…バグという名の刺客…",
                "この痛み…乗り越えてみせる！",
            ],
            ChuuniEvent::TaskDone => &["任務完了。世界は救われた", "フハハ！完璧だ！", "これが…俺の全力だ"],
            ChuuniEvent::PermissionPrompt => &["待機中…", "指示を待っている…", "我が主よ、命令を…"],
            ChuuniEvent::Thinking => &[
                "深淵を覗いている…",
                "我が演算、限界を超えつつある…",
                "静かに…思考の渦に落ちていく",
            ],
        }
    }

    /// One of [`lines`](Self::lines), chosen at random.
    pub fn line(self) -> &'static str {
        self.lines()
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or_default()
    }
}

impl fmt::Display for ChuuniEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no built-in event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event {0:?}")]
pub struct UnknownEvent(pub String);

impl FromStr for ChuuniEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == wanted)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_through_str() {
        for event in ChuuniEvent::ALL {
            assert_eq!(event.as_str().parse::<ChuuniEvent>(), Ok(event));
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Coding".parse::<ChuuniEvent>(), Ok(ChuuniEvent::Coding));
        assert_eq!(" TASK_DONE ".parse::<ChuuniEvent>(), Ok(ChuuniEvent::TaskDone));
    }

    #[test]
    fn test_every_event_has_lines() {
        for event in ChuuniEvent::ALL {
            assert_eq!(event.lines().len(), 3, "{event}");
            assert!(event.lines().contains(&event.line()));
        }
    }

    #[test]
    fn test_unknown_event() {
        let err = "dancing".parse::<ChuuniEvent>().unwrap_err();
        assert_eq!(err.to_string(), "unknown event \"dancing\"");
    }
}
