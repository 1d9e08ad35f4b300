//! One progress line per service.
//!
//! Widgets live in a `Vec` in request order (their display row) with a name to
//! index map on the side, so iteration order is fixed and lookups are O(1).
//! The board is the only place widget state is mutated.

use std::collections::HashMap;
use std::io::{self, Write};

use crossterm::cursor::{MoveToNextLine, MoveToPreviousLine};
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use tracing::{debug, warn};

use shoal_core::LifecycleError;
use shoal_core::model::{ServiceName, StatusEvent, StatusPayload};

use super::console::{Console, RenderMode};
use super::geometry::Budget;
use super::render::bound;
use crate::ui::Theme;

const BAR_WIDTH: usize = 20;
const PLACEHOLDER: &str = "...";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WidgetState {
    Initialized,
    InProgress,
    Succeeded,
    Failed,
}

impl WidgetState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

#[derive(Clone, Debug)]
pub struct Widget {
    pub name: ServiceName,
    /// Display row, fixed at creation
    pub position: usize,
    pub total_steps: Option<u64>,
    pub current_step: u64,
    /// Service name padded to the longest name on the board
    pub description: String,
    /// Bounded in-progress text
    pub footer: String,
    /// Bounded failure message, replaces the bar once set
    pub failure: Option<String>,
    pub state: WidgetState,
    closed: bool,
}

impl Widget {
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn line(&self, theme: &Theme) -> String {
        if let Some(message) = &self.failure {
            return format!("{}: {}", self.description, theme.failure(message));
        }

        let total = self
            .total_steps
            .map(|t| t.to_string())
            .unwrap_or_else(|| "?".into());
        format!(
            "{}: {}/{}|{}| {}",
            self.description,
            self.current_step,
            total,
            self.bar(),
            self.footer
        )
    }

    fn bar(&self) -> String {
        let filled = match self.total_steps {
            Some(total) if total > 0 => {
                (self.current_step.min(total) * BAR_WIDTH as u64 / total) as usize
            }
            _ => 0,
        };
        let mut bar = "█".repeat(filled);
        bar.extend(std::iter::repeat_n(' ', BAR_WIDTH - filled));
        bar
    }
}

/// What applying an event did to its widget
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    Progressed,
    Succeeded,
    Failed { message: String },
    /// Protocol violation, nothing changed
    Ignored,
}

/// Check that `names` can make up a board: non-empty and free of duplicates.
pub fn check_names(names: &[ServiceName]) -> Result<(), LifecycleError> {
    index_names(names).map(|_| ())
}

fn index_names(names: &[ServiceName]) -> Result<HashMap<ServiceName, usize>, LifecycleError> {
    if names.is_empty() {
        return Err(LifecycleError::configuration("no services to operate on"));
    }

    let mut index = HashMap::with_capacity(names.len());
    for (position, name) in names.iter().enumerate() {
        if index.insert(name.clone(), position).is_some() {
            return Err(LifecycleError::configuration(format!(
                "service '{}' requested more than once",
                name
            )));
        }
    }
    Ok(index)
}

pub struct Board<'a, W: Write> {
    console: &'a mut Console<W>,
    widgets: Vec<Widget>,
    index: HashMap<ServiceName, usize>,
    mode: RenderMode,
}

impl<'a, W: Write> Board<'a, W> {
    /// Create one widget per service, in the given order.
    ///
    /// Fails before writing anything if `names` is empty or has duplicates.
    pub fn build(names: &[ServiceName], console: &'a mut Console<W>) -> Result<Self, LifecycleError> {
        let index = index_names(names)?;

        // Cursor movement cannot reach rows scrolled off the top
        let mode = match (console.mode(), console.rows()) {
            (RenderMode::Live, Some(rows)) if names.len() >= usize::from(rows) => {
                debug!(services = names.len(), rows, "board taller than terminal, rendering plain");
                RenderMode::Plain
            }
            (mode, _) => mode,
        };

        let longest = names.iter().map(|n| n.chars().count()).max().unwrap_or(0);
        let footer = bound(PLACEHOLDER, console.width(Budget::Right));

        let widgets = names
            .iter()
            .enumerate()
            .map(|(position, name)| Widget {
                name: name.clone(),
                position,
                total_steps: None,
                current_step: 0,
                description: format!("{:<width$}", name, width = longest),
                footer: footer.clone(),
                failure: None,
                state: WidgetState::Initialized,
                closed: false,
            })
            .collect();

        let mut board = Self {
            console,
            widgets,
            index,
            mode,
        };
        board.draw_initial()?;
        Ok(board)
    }

    #[cfg(test)]
    pub fn widget(&self, name: &str) -> Option<&Widget> {
        self.index.get(name).map(|&i| &self.widgets[i])
    }

    #[cfg(test)]
    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// True once [`Board::close_all`] ran
    pub fn is_closed(&self) -> bool {
        self.widgets.iter().all(Widget::is_closed)
    }

    /// Apply one engine event to its widget and redraw it.
    pub fn apply(&mut self, event: &StatusEvent) -> io::Result<Transition> {
        let Some(&idx) = self.index.get(&event.service) else {
            warn!(service = %event.service, "event for unknown service ignored");
            return Ok(Transition::Ignored);
        };
        let widget = &self.widgets[idx];
        if widget.is_closed() {
            warn!(service = %widget.name, "event after board was closed ignored");
            return Ok(Transition::Ignored);
        }
        if widget.state.is_terminal() {
            warn!(service = %widget.name, state = ?widget.state, "event for finished service ignored");
            return Ok(Transition::Ignored);
        }

        match (&event.payload, event.finished) {
            (StatusPayload::Failure { message }, true) => {
                let text = bound(message, self.console.width(Budget::Error));
                let widget = &mut self.widgets[idx];
                widget.failure = Some(text);
                widget.state = WidgetState::Failed;
                self.redraw(idx)?;
                Ok(Transition::Failed {
                    message: message.clone(),
                })
            }

            // The last in-progress line stays as the final display
            (StatusPayload::Success, true) => {
                self.widgets[idx].state = WidgetState::Succeeded;
                Ok(Transition::Succeeded)
            }

            (StatusPayload::InProgress { .. }, true) => {
                debug!(service = %event.service, "finished with progress payload, treating as success");
                self.widgets[idx].state = WidgetState::Succeeded;
                Ok(Transition::Succeeded)
            }

            (
                StatusPayload::InProgress {
                    text,
                    current_step,
                    steps,
                },
                false,
            ) => {
                let footer = bound(text, self.console.width(Budget::Right));
                let widget = &mut self.widgets[idx];
                widget.footer = footer;
                if let Some(steps) = steps {
                    if widget.total_steps != Some(*steps) {
                        widget.total_steps = Some(*steps);
                    }
                }
                // Advance by the delta to the reported step; never move backwards
                widget.current_step += current_step.saturating_sub(widget.current_step);
                widget.state = WidgetState::InProgress;
                self.redraw(idx)?;
                Ok(Transition::Progressed)
            }

            (StatusPayload::Failure { .. } | StatusPayload::Success, false) => {
                warn!(service = %event.service, "terminal payload without finished flag ignored");
                Ok(Transition::Ignored)
            }
        }
    }

    /// Finalize every widget, last row first, each followed by a blank line.
    ///
    /// Only the first call has an effect.
    pub fn close_all(&mut self) -> io::Result<()> {
        if self.is_closed() {
            warn!("progress board closed twice");
            return Ok(());
        }

        // Blank lines written so far push the board further up
        let mut emitted = 0;
        for idx in (0..self.widgets.len()).rev() {
            match self.mode {
                RenderMode::Live => self.redraw_at(idx, emitted)?,
                RenderMode::Plain => {
                    let line = self.widgets[idx].line(&self.console.theme());
                    writeln!(self.console, "{}", line)?;
                }
            }
            writeln!(self.console)?;
            emitted += 1;
            self.widgets[idx].closed = true;
        }
        self.console.flush()
    }

    fn draw_initial(&mut self) -> io::Result<()> {
        if self.mode == RenderMode::Live {
            let theme = self.console.theme();
            for widget in &self.widgets {
                writeln!(self.console, "{}", widget.line(&theme))?;
            }
        }
        self.console.flush()
    }

    /// Rewrite the line of widget `idx`. In live mode the cursor rests on the
    /// row below the last widget between redraws.
    fn redraw(&mut self, idx: usize) -> io::Result<()> {
        self.redraw_at(idx, 0)
    }

    /// Like [`Board::redraw`], with `below` extra rows between the board and the cursor.
    fn redraw_at(&mut self, idx: usize, below: usize) -> io::Result<()> {
        let widget = &self.widgets[idx];
        let line = widget.line(&self.console.theme());
        match self.mode {
            RenderMode::Live => {
                let rows_up =
                    u16::try_from(self.widgets.len() - widget.position + below).unwrap_or(u16::MAX);
                queue!(
                    self.console,
                    MoveToPreviousLine(rows_up),
                    Clear(ClearType::CurrentLine),
                    Print(line),
                    MoveToNextLine(rows_up)
                )?;
            }
            RenderMode::Plain => writeln!(self.console, "{}", line)?,
        }
        self.console.flush()
    }
}
