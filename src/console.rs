use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::{
    alerts::{AlertFeed, Alerts},
    client::{ClusterResponse, Transport},
    dispatch::RequestDispatcher,
    editor::{BodyEditor, Editor},
    session::RestSession,
    storage::FileStore,
    ui::{ConsoleView, Focus, ResponsePane, UserAction, UI},
};

const INPUT_POLL_MS: u64 = 100;

type Outcome = Result<ClusterResponse>;

/// Interactive REST console driving a `RestSession` from the terminal.
pub struct Console {
    ui: UI,
    session: RestSession<FileStore, BodyEditor>,
    dispatcher: RequestDispatcher,
    alerts: AlertFeed,
    host: String,
    focus: Focus,
    response: ResponsePane,
    outcomes_tx: mpsc::UnboundedSender<Outcome>,
    outcomes_rx: mpsc::UnboundedReceiver<Outcome>,
}

impl Console {
    pub fn new(
        host: String,
        session: RestSession<FileStore, BodyEditor>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let alerts = AlertFeed::new();
        let dispatcher = RequestDispatcher::new(transport, Arc::new(alerts.clone()));
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();

        Ok(Self {
            ui: UI::new()?,
            session,
            dispatcher,
            alerts,
            host,
            focus: Focus::Path,
            response: ResponsePane::Empty,
            outcomes_tx,
            outcomes_rx,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        let result = self.main_loop().await;
        self.ui.cleanup()?;
        result
    }

    async fn main_loop(&mut self) -> Result<()> {
        self.session.initialize(BodyEditor::new());
        self.render()?;

        loop {
            while let Ok(outcome) = self.outcomes_rx.try_recv() {
                self.handle_outcome(outcome);
                self.render()?;
            }

            let timeout = Duration::from_millis(INPUT_POLL_MS);
            let Some(action) = self.ui.get_user_input(self.focus, timeout)? else {
                tokio::task::yield_now().await;
                continue;
            };

            match action {
                UserAction::Quit => break,
                UserAction::Send => self.send_request(),
                UserAction::CycleMethod => self.session.cycle_method(),
                UserAction::FormatBody => self.format_body(),
                UserAction::ClearHistory => self.clear_history(),
                UserAction::NextFocus => self.focus = self.focus.next(),
                UserAction::InputChar(c) => self.handle_input_char(c),
                UserAction::Backspace => self.handle_backspace(),
                UserAction::Newline => {
                    if let Some(editor) = self.session.editor_mut() {
                        editor.insert_newline();
                    }
                }
                UserAction::SelectPrevHistory => self.ui.select_prev_history(),
                UserAction::SelectNextHistory => {
                    self.ui.select_next_history(self.session.history().len())
                }
                UserAction::LoadSelectedHistory => self.load_selected_history(),
                UserAction::ScrollUp => self.ui.scroll_up(),
                UserAction::ScrollDown => self.ui.scroll_down(),
                UserAction::DismissAlert => self.alerts.dismiss(),
            }
            self.render()?;
        }

        Ok(())
    }

    fn send_request(&mut self) {
        let tx = self.outcomes_tx.clone();
        let dispatched = self.session.send_request(&self.dispatcher, move |outcome| {
            // receiver only goes away when the console exits
            let _ = tx.send(outcome);
        });

        if dispatched.is_some() {
            let request = self.session.request();
            self.response = ResponsePane::Pending {
                method: request.method().to_string(),
                path: request.path().to_string(),
            };
            self.ui.reset_scroll();
            self.ui.reset_history_selection();
        }
    }

    fn handle_outcome(&mut self, outcome: Outcome) {
        self.response = match outcome {
            Ok(response) => ResponsePane::Success {
                status: response.status,
                body: response.body,
            },
            Err(err) => {
                self.alerts.error(&format!("Request failed: {err}"));
                ResponsePane::Failure {
                    message: err.to_string(),
                }
            }
        };
        self.ui.reset_scroll();
    }

    fn format_body(&mut self) {
        if let Some(editor) = self.session.editor_mut() {
            editor.format();
            if let Some(err) = editor.error() {
                let message = format!("Body is not valid JSON: {err}");
                self.alerts.warn(&message);
            }
        }
    }

    fn clear_history(&mut self) {
        match self.session.clear_history() {
            Ok(()) => {
                self.ui.reset_history_selection();
                self.alerts.success("Request history cleared");
            }
            Err(err) => self.alerts.error(&format!("Failed to clear history: {err}")),
        }
    }

    fn load_selected_history(&mut self) {
        let index = self.ui.get_selected_history();
        if self.session.load_history_entry(index) {
            self.focus = Focus::Body;
        }
    }

    fn handle_input_char(&mut self, c: char) {
        match self.focus {
            Focus::Path => {
                let mut path = self.session.request().path().to_string();
                path.push(c);
                self.session.set_path(path);
            }
            Focus::Body => {
                if let Some(editor) = self.session.editor_mut() {
                    editor.insert_char(c);
                }
            }
            Focus::History => {}
        }
    }

    fn handle_backspace(&mut self) {
        match self.focus {
            Focus::Path => {
                let mut path = self.session.request().path().to_string();
                path.pop();
                self.session.set_path(path);
            }
            Focus::Body => {
                if let Some(editor) = self.session.editor_mut() {
                    editor.backspace();
                }
            }
            Focus::History => {}
        }
    }

    fn view(&self) -> ConsoleView {
        let request = self.session.request();
        let editor = self.session.editor();
        ConsoleView {
            host: self.host.clone(),
            method: request.method().to_string(),
            path: request.path().to_string(),
            body: editor.map_or_else(|| request.body().to_string(), |e| e.value().to_string()),
            body_error: editor.and_then(|e| e.error()).map(str::to_string),
            history: self
                .session
                .history()
                .list()
                .iter()
                .map(|r| r.to_string())
                .collect(),
            response: self.response.clone(),
            focus: self.focus,
            alert: self.alerts.latest(),
        }
    }

    fn render(&mut self) -> Result<()> {
        let view = self.view();
        self.ui.render(&view)
    }
}
