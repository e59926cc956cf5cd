use anyhow::Result;
use tokio::task::JoinHandle;

use crate::client::ClusterResponse;
use crate::dispatch::RequestDispatcher;
use crate::editor::Editor;
use crate::history::RequestHistory;
use crate::request::Request;
use crate::storage::KeyValueStore;

pub const METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "HEAD"];

/// State behind the REST console: the request being composed, its body
/// editor and the request history.
pub struct RestSession<S, E> {
    request: Request,
    editor: Option<E>,
    history: RequestHistory<S>,
}

impl<S: KeyValueStore, E: Editor> RestSession<S, E> {
    pub fn new(store: S) -> Self {
        Self {
            request: Request::default(),
            editor: None,
            history: RequestHistory::new(store),
        }
    }

    /// Attaches the body editor, seeds it with the current body and loads
    /// the persisted history.
    pub fn initialize(&mut self, mut editor: E) {
        editor.set_value(self.request.body());
        self.editor = Some(editor);
        self.history.load();
    }

    pub fn load_from_history(&mut self, request: Request) {
        if let Some(editor) = self.editor.as_mut() {
            editor.set_value(request.body());
        }
        self.request = request;
    }

    /// Loads the history entry at `index`; out-of-range indexes are ignored.
    pub fn load_history_entry(&mut self, index: usize) -> bool {
        let Some(request) = self.history.get(index).cloned() else {
            return false;
        };
        self.load_from_history(request);
        true
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.request = self.request.with_path(path);
    }

    pub fn set_method(&mut self, method: impl Into<String>) {
        self.request = self.request.with_method(method);
    }

    /// Moves to the next method in `METHODS`, wrapping around.
    pub fn cycle_method(&mut self) {
        let next = METHODS
            .iter()
            .position(|m| *m == self.request.method())
            .map_or(0, |i| (i + 1) % METHODS.len());
        self.set_method(METHODS[next]);
    }

    /// Formats the editor body and hands the request to `dispatcher`.
    pub fn send_request<F>(
        &mut self,
        dispatcher: &RequestDispatcher,
        on_complete: F,
    ) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Result<ClusterResponse>) + Send + 'static,
    {
        let body = match self.editor.as_mut() {
            Some(editor) => editor.format(),
            None => self.request.body().to_string(),
        };
        self.request = self.request.with_body(body.clone());
        dispatcher.send(&self.request, &body, &mut self.history, on_complete)
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.history.clear()?;
        Ok(())
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn editor(&self) -> Option<&E> {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut E> {
        self.editor.as_mut()
    }

    pub fn history(&self) -> &RequestHistory<S> {
        &self.history
    }
}
