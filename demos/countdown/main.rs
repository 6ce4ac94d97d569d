//! Interactive countdown.
//!
//! Keys: `s` start, `p` stop, `space` toggle, `r` reset to a past instant,
//! `n` reset to one minute from now, `f` set formats, `c` clear formats,
//! `l` announce completion, `v` toggle visibility, `q` quit.
//!
//! Set `RUST_LOG=debug` to see the controller's state transitions on stderr.

use bubbletea_rs::{quit, Cmd, KeyMsg, Model as BubbleTeaModel, Msg, Program};
use countdown_chronometer::prelude::*;
use crossterm::event::{KeyCode, KeyModifiers};
use lipgloss_extras::prelude::*;

/// 2011-08-26 09:00:00 UTC.
const PAST_INSTANT: i64 = 1_314_349_200_000;

struct App {
    countdown: Countdown,
    announce: bool,
    status: String,
}

impl App {
    fn reset(&mut self, base: i64) -> Option<Cmd> {
        self.status.clear();
        self.countdown.set_base(base)
    }
}

impl BubbleTeaModel for App {
    fn init() -> (Self, Option<Cmd>) {
        let countdown = countdown_new(now_millis() + 60_000)
            .with_style(Style::new().bold(true).foreground(Color::from("205")));
        let cmd = countdown.init();
        let app = Self {
            countdown,
            announce: false,
            status: String::new(),
        };
        (app, Some(cmd))
    }

    fn update(&mut self, msg: Msg) -> Option<Cmd> {
        if let Some(key) = msg.downcast_ref::<KeyMsg>() {
            if key.modifiers.contains(KeyModifiers::CONTROL) && key.key == KeyCode::Char('c') {
                return Some(quit());
            }
            return match key.key {
                KeyCode::Char('q') | KeyCode::Esc => Some(quit()),
                KeyCode::Char('s') => Some(self.countdown.start()),
                KeyCode::Char('p') => Some(self.countdown.stop()),
                KeyCode::Char(' ') => Some(self.countdown.toggle()),
                KeyCode::Char('r') => self.reset(PAST_INSTANT),
                KeyCode::Char('n') => self.reset(now_millis() + 60_000),
                KeyCode::Char('f') => {
                    let controller = self.countdown.controller();
                    controller.set_custom_chrono_format(Some(
                        "%1$02d days, %2$02d hours, %3$02d minutes and %4$02d seconds remaining"
                            .to_string(),
                    ));
                    controller.set_format(Some("Formatted time (%s)".to_string()));
                    None
                }
                KeyCode::Char('c') => {
                    let controller = self.countdown.controller();
                    controller.set_custom_chrono_format(None);
                    controller.set_format(None);
                    None
                }
                KeyCode::Char('l') => {
                    self.announce = true;
                    None
                }
                KeyCode::Char('v') => {
                    let visible = !self.countdown.controller().is_visible();
                    self.countdown.set_visible(visible)
                }
                _ => None,
            };
        }

        if let Some(timeout) = msg.downcast_ref::<CountdownTimeoutMsg>() {
            if timeout.id == self.countdown.id() && self.announce {
                self.status = "We have lift off!".to_string();
            }
        }

        self.countdown.update(msg)
    }

    fn view(&self) -> String {
        let phase = match self.countdown.controller().phase() {
            CountdownPhase::Running => "running",
            CountdownPhase::Stopped => "stopped",
            CountdownPhase::Completed => "completed",
        };
        let help = Style::new().foreground(Color::from("241")).render(
            "s start • p stop • space toggle • r/n reset • f/c format • l listener • v visible • q quit",
        );
        format!(
            "\n  {}\n\n  [{}] {}\n\n  {}\n",
            self.countdown.view(),
            phase,
            self.status,
            help
        )
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let program = Program::<App>::builder().alt_screen(true).build()?;
    program.run().await?;
    Ok(())
}
