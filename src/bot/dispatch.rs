//! Update dispatch: commands, callback presses and document uploads.
//!
//! One [`Dispatcher`] owns every collaborator behind a trait object, so the
//! whole chat flow is testable with in-memory fakes. All user-visible error
//! text flows through the boundary in [`Dispatcher::handle`];
//! [`BotError::Validation`] is shown verbatim, anything else is logged and
//! answered generically.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::bot::auth::Authorizer;
use crate::bot::command::{self, ParsedCommand};
use crate::bot::router::{FaultResolution, QueryRouter};
use crate::bot::state::{
    CraneScope, FaultChoice, MenuAction, MenuState, FAULTS_PER_PAGE, MONTHS_PER_ROW,
};
use crate::bot::transport::{
    Button, ChatId, ChatTransport, Keyboard, MessageId, TransportError, UserId,
};
use crate::bot::BotError;
use crate::config::Settings;
use crate::models::crane_label;
use crate::repository::{FaultRepository, MaintenanceRepository};
use crate::services::chart::{ChartInput, ChartRenderer};
use crate::services::ingest::{decode_export_bytes, ArchiveKind, ArchiveOpener, Ingestor};

/// Records shown in a `show_data` preview.
const PREVIEW_LIMIT: usize = 20;
/// Ceiling on outgoing message length, in characters.
const MESSAGE_LIMIT: usize = 4000;

const USAGE: &str = "Usage: /data|/graph|/delete [crane] [start end] [fault]\n\
    crane: all or a crane number\n\
    dates: DD-MM-YYYY\n\
    fault: all, a fault id, or a search keyword\n\
    With no arguments the menu walks you through the same choices.";

const HELP: &str = "Crane fault tracker.\n\
    /data shows raw records, /graph draws fault frequency charts, \
    /delete removes records (admins only).\n\
    /id shows your user id. Upload a ZIP or RAR of PLC exports to \
    ingest data, or a CSV fault library to extend fault references.";

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// One normalized update from the chat platform.
#[derive(Debug, Clone)]
pub enum Incoming {
    Command {
        chat: ChatId,
        user: UserId,
        name: String,
        args: String,
    },
    Callback {
        chat: ChatId,
        user: UserId,
        message: MessageId,
        token: String,
    },
    Upload {
        chat: ChatId,
        user: UserId,
        file_id: String,
        file_name: String,
        mime: String,
    },
}

/// What an uploaded document is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadKind {
    Archive(ArchiveKind),
    FaultLibrary,
    Unsupported,
}

fn classify_upload(mime: &str, file_name: &str) -> UploadKind {
    match mime {
        "application/zip" | "application/x-zip-compressed" => UploadKind::Archive(ArchiveKind::Zip),
        "application/x-rar-compressed" | "application/vnd.rar" => {
            UploadKind::Archive(ArchiveKind::Rar)
        }
        "text/csv" | "text/comma-separated-values" => UploadKind::FaultLibrary,
        _ => {
            let lower = file_name.to_ascii_lowercase();
            if lower.ends_with(".zip") {
                UploadKind::Archive(ArchiveKind::Zip)
            } else if lower.ends_with(".rar") {
                UploadKind::Archive(ArchiveKind::Rar)
            } else if lower.ends_with(".csv") {
                UploadKind::FaultLibrary
            } else {
                UploadKind::Unsupported
            }
        }
    }
}

fn display_date(date: NaiveDate) -> String {
    date.format(command::COMMAND_DATE).to_string()
}

fn truncate_message(text: String) -> String {
    if text.chars().count() <= MESSAGE_LIMIT {
        return text;
    }
    let mut out: String = text.chars().take(MESSAGE_LIMIT - 1).collect();
    out.push('…');
    out
}

pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    renderer: Arc<dyn ChartRenderer>,
    authorizer: Arc<dyn Authorizer>,
    opener: Arc<dyn ArchiveOpener>,
    faults: FaultRepository,
    records: MaintenanceRepository,
    router: QueryRouter,
    ingestor: Ingestor,
    settings: Settings,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        renderer: Arc<dyn ChartRenderer>,
        authorizer: Arc<dyn Authorizer>,
        opener: Arc<dyn ArchiveOpener>,
        faults: FaultRepository,
        records: MaintenanceRepository,
        settings: Settings,
    ) -> Self {
        let router = QueryRouter::new(faults.clone(), records.clone());
        let ingestor = Ingestor::new(faults.clone(), records.clone());
        Self {
            transport,
            renderer,
            authorizer,
            opener,
            faults,
            records,
            router,
            ingestor,
            settings,
        }
    }

    /// Handle one update. Never returns an error to the event loop; the
    /// outcome is always delivered to the chat (or logged when even that
    /// fails).
    pub async fn handle(&self, incoming: Incoming) {
        let chat = match &incoming {
            Incoming::Command { chat, .. }
            | Incoming::Callback { chat, .. }
            | Incoming::Upload { chat, .. } => *chat,
        };
        let outcome = match incoming {
            Incoming::Command {
                chat,
                user,
                name,
                args,
            } => self.handle_command(chat, user, &name, &args).await,
            Incoming::Callback {
                chat,
                user,
                message,
                token,
            } => self.handle_callback(chat, user, message, &token).await,
            Incoming::Upload {
                chat,
                user,
                file_id,
                file_name,
                mime,
            } => {
                self.handle_upload(chat, user, &file_id, &file_name, &mime)
                    .await
            }
        };

        let reply = match outcome {
            Ok(()) => return,
            Err(BotError::Validation(text)) => text,
            Err(err) => {
                error!(%err, chat, "update failed");
                "Something went wrong, please try again.".to_string()
            }
        };
        if let Err(err) = self.transport.send_text(chat, &reply).await {
            warn!(%err, chat, "failed to deliver error reply");
        }
    }

    async fn handle_command(
        &self,
        chat: ChatId,
        user: UserId,
        name: &str,
        args: &str,
    ) -> Result<(), BotError> {
        match name {
            "start" | "help" => {
                self.transport
                    .send_keyboard(chat, HELP, &main_menu())
                    .await?;
                Ok(())
            }
            "id" => {
                self.transport
                    .send_text(chat, &format!("Your id: {user}"))
                    .await?;
                Ok(())
            }
            "data" => self.handle_query_command(chat, user, MenuAction::ShowData, args).await,
            "graph" => {
                self.handle_query_command(chat, user, MenuAction::ShowGraph, args)
                    .await
            }
            "delete" => {
                if !self.authorizer.is_admin(user) {
                    return Err(BotError::Validation(format!(
                        "Not authorized. Your id: {user}"
                    )));
                }
                self.handle_query_command(chat, user, MenuAction::DeleteData, args)
                    .await
            }
            _ => Err(BotError::Validation(
                "Unknown command. Try /help.".to_string(),
            )),
        }
    }

    async fn handle_query_command(
        &self,
        chat: ChatId,
        user: UserId,
        action: MenuAction,
        args: &str,
    ) -> Result<(), BotError> {
        match command::parse(args) {
            ParsedCommand::Full {
                crane,
                start,
                end,
                fault,
            } => {
                match self.router.resolve_fault(&fault).await? {
                    FaultResolution::Resolved(fault_id) => {
                        let fault = match fault_id {
                            Some(id) => FaultChoice::Id(id),
                            None => FaultChoice::All,
                        };
                        self.run_terminal(chat, user, action, crane, start, end, fault)
                            .await
                    }
                    FaultResolution::Choices(choices) => {
                        // Several references match the keyword; let the user
                        // pick, carrying the full query in each token.
                        let buttons = choices
                            .iter()
                            .map(|fault| {
                                let state = MenuState::Terminal {
                                    action,
                                    crane,
                                    start,
                                    end,
                                    fault: FaultChoice::Id(fault.fault_id),
                                };
                                vec![Button::new(fault.label(), state.encode())]
                            })
                            .collect();
                        self.transport
                            .send_keyboard(
                                chat,
                                "Several faults match, pick one:",
                                &Keyboard::new(buttons),
                            )
                            .await?;
                        Ok(())
                    }
                }
            }
            ParsedCommand::CraneMenu => {
                let (text, keyboard) = self.render_crane_select(action).await?;
                self.transport.send_keyboard(chat, &text, &keyboard).await?;
                Ok(())
            }
            ParsedCommand::YearMenu { crane } => {
                let state = MenuState::YearSelect {
                    action,
                    crane,
                    start: None,
                };
                let (text, keyboard) = self.render_year_select(&state).await?;
                self.transport.send_keyboard(chat, &text, &keyboard).await?;
                Ok(())
            }
            ParsedCommand::FaultMenu { crane, start, end } => {
                let state = MenuState::FaultSelect {
                    action,
                    crane,
                    start,
                    end,
                    page: 1,
                };
                let (text, keyboard) = self.render_fault_select(&state).await?;
                self.transport.send_keyboard(chat, &text, &keyboard).await?;
                Ok(())
            }
            ParsedCommand::Usage => Err(BotError::Validation(USAGE.to_string())),
        }
    }

    async fn handle_callback(
        &self,
        chat: ChatId,
        user: UserId,
        message: MessageId,
        token: &str,
    ) -> Result<(), BotError> {
        let Some(state) = MenuState::decode(token) else {
            return Err(BotError::Validation(
                "That menu is stale, start again with /data.".to_string(),
            ));
        };
        info!(chat, token, "menu callback");

        match state {
            MenuState::Help => {
                self.transport
                    .edit_keyboard(chat, message, HELP, &main_menu())
                    .await?;
                Ok(())
            }
            MenuState::CraneSelect { action } => {
                let (text, keyboard) = self.render_crane_select(action).await?;
                self.transport
                    .edit_keyboard(chat, message, &text, &keyboard)
                    .await?;
                Ok(())
            }
            state @ MenuState::YearSelect { .. } => {
                let (text, keyboard) = self.render_year_select(&state).await?;
                self.transport
                    .edit_keyboard(chat, message, &text, &keyboard)
                    .await?;
                Ok(())
            }
            state @ MenuState::MonthSelect { .. } => {
                let (text, keyboard) = render_month_select(&state)?;
                self.transport
                    .edit_keyboard(chat, message, &text, &keyboard)
                    .await?;
                Ok(())
            }
            state @ MenuState::FaultSelect { .. } => {
                let (text, keyboard) = self.render_fault_select(&state).await?;
                self.transport
                    .edit_keyboard(chat, message, &text, &keyboard)
                    .await?;
                Ok(())
            }
            MenuState::Terminal {
                action,
                crane,
                start,
                end,
                fault,
            } => {
                self.run_terminal(chat, user, action, crane, start, end, fault)
                    .await
            }
            MenuState::ConfirmDelete {
                crane,
                start,
                end,
                fault,
            } => {
                self.run_confirmed_delete(chat, user, message, crane, start, end, fault)
                    .await
            }
            MenuState::CancelDelete => {
                self.transport
                    .edit_text(chat, message, "Delete cancelled.")
                    .await?;
                Ok(())
            }
        }
    }

    async fn render_crane_select(
        &self,
        action: MenuAction,
    ) -> Result<(String, Keyboard), BotError> {
        let cranes = self.records.distinct_cranes().await?;
        if cranes.is_empty() {
            return Err(BotError::Validation("No data recorded yet.".to_string()));
        }
        let mut buttons = vec![Button::new(
            "All cranes",
            MenuState::YearSelect {
                action,
                crane: CraneScope::All,
                start: None,
            }
            .encode(),
        )];
        buttons.extend(cranes.into_iter().map(|id| {
            Button::new(
                crane_label(id),
                MenuState::YearSelect {
                    action,
                    crane: CraneScope::Id(id),
                    start: None,
                }
                .encode(),
            )
        }));
        Ok(("Pick a crane:".to_string(), Keyboard::grid(buttons, 3)))
    }

    async fn render_year_select(&self, state: &MenuState) -> Result<(String, Keyboard), BotError> {
        let MenuState::YearSelect { crane, start, .. } = state else {
            return Err(BotError::Validation("Bad menu state.".to_string()));
        };
        let years = self.records.distinct_years(crane.filter()).await?;
        if years.is_empty() {
            return Err(BotError::Validation(
                "No data recorded for that crane.".to_string(),
            ));
        }
        let buttons = years
            .into_iter()
            .map(|year| Button::new(year.to_string(), format!("{}|{year}", state.encode())))
            .collect();
        let text = match start {
            None => "Pick the start year:",
            Some(_) => "Pick the end year:",
        };
        Ok((text.to_string(), Keyboard::grid(buttons, 3)))
    }

    async fn render_fault_select(&self, state: &MenuState) -> Result<(String, Keyboard), BotError> {
        let &MenuState::FaultSelect {
            action,
            crane,
            start,
            end,
            page,
        } = state
        else {
            return Err(BotError::Validation("Bad menu state.".to_string()));
        };
        let faults = self
            .records
            .faults_in_range(start, end, crane.filter())
            .await?;
        if faults.is_empty() {
            return Err(BotError::Validation(
                "No data in the selected range.".to_string(),
            ));
        }

        let pages = faults.len().div_ceil(FAULTS_PER_PAGE).max(1);
        let page = page.min(pages);
        let offset = (page - 1) * FAULTS_PER_PAGE;

        let terminal = |fault: FaultChoice| {
            MenuState::Terminal {
                action,
                crane,
                start,
                end,
                fault,
            }
            .encode()
        };
        let mut rows = vec![vec![Button::new("All faults", terminal(FaultChoice::All))]];
        rows.extend(
            faults
                .iter()
                .skip(offset)
                .take(FAULTS_PER_PAGE)
                .map(|fault| {
                    vec![Button::new(
                        fault.label(),
                        terminal(FaultChoice::Id(fault.fault_id)),
                    )]
                }),
        );
        let mut nav = Vec::new();
        if page > 1 {
            if let Some(token) = state.page_token(page - 1) {
                nav.push(Button::new("⬅ Prev", token));
            }
        }
        if page < pages {
            if let Some(token) = state.page_token(page + 1) {
                nav.push(Button::new("Next ➡", token));
            }
        }
        if !nav.is_empty() {
            rows.push(nav);
        }

        let text = format!(
            "Pick a fault ({} to {}, page {page}/{pages}):",
            display_date(start),
            display_date(end)
        );
        Ok((text, Keyboard::new(rows)))
    }

    async fn run_terminal(
        &self,
        chat: ChatId,
        user: UserId,
        action: MenuAction,
        crane: CraneScope,
        start: NaiveDate,
        end: NaiveDate,
        fault: FaultChoice,
    ) -> Result<(), BotError> {
        match action {
            MenuAction::ShowData => self.show_data(chat, crane, start, end, fault).await,
            MenuAction::ShowGraph => self.send_charts(chat, crane, start, end, fault).await,
            MenuAction::DeleteData => {
                // Gated before any read, not just at the confirm press.
                if !self.authorizer.is_admin(user) {
                    return Err(BotError::Validation(format!(
                        "Not authorized. Your id: {user}"
                    )));
                }
                self.offer_delete(chat, crane, start, end, fault).await
            }
        }
    }

    async fn show_data(
        &self,
        chat: ChatId,
        crane: CraneScope,
        start: NaiveDate,
        end: NaiveDate,
        fault: FaultChoice,
    ) -> Result<(), BotError> {
        let records = self
            .router
            .fetch(start, end, crane.filter(), fault.filter())
            .await?;
        if records.is_empty() {
            return Err(BotError::Validation(
                "No data for the selected range.".to_string(),
            ));
        }

        let total = records.len();
        let shown = total.min(PREVIEW_LIMIT);
        let preview = serde_json::to_string_pretty(&records[..shown])
            .map_err(|err| BotError::Validation(format!("could not format records: {err}")))?;
        let text = format!("Found {total} records, showing {shown}:\n{preview}");
        self.transport
            .send_text(chat, &truncate_message(text))
            .await?;
        Ok(())
    }

    /// One chart per (crane, fault) group in the result set.
    ///
    /// Each group gets a placeholder message while rendering runs on the
    /// blocking pool; a rate-limited photo send sleeps and resends the
    /// already-rendered image. A failed render warns in place and moves on
    /// to the next group.
    async fn send_charts(
        &self,
        chat: ChatId,
        crane: CraneScope,
        start: NaiveDate,
        end: NaiveDate,
        fault: FaultChoice,
    ) -> Result<(), BotError> {
        let records = self
            .router
            .fetch(start, end, crane.filter(), fault.filter())
            .await?;
        if records.is_empty() {
            return Err(BotError::Validation(
                "No data for the selected range.".to_string(),
            ));
        }

        let mut groups: BTreeMap<(i32, String), Vec<_>> = BTreeMap::new();
        for record in records {
            groups
                .entry((record.crane_id, record.fault_name.clone()))
                .or_default()
                .push(record);
        }

        for ((crane_id, fault_name), group) in groups {
            let caption = format!(
                "{} {} ({} to {})",
                crane_label(crane_id),
                fault_name,
                display_date(start),
                display_date(end)
            );
            let placeholder = self
                .transport
                .send_text(chat, &format!("Rendering chart: {caption}"))
                .await?;

            let input = ChartInput::build(crane_id, fault_name.clone(), &group, start, end);
            let renderer = Arc::clone(&self.renderer);
            let rendered = tokio::task::spawn_blocking(move || renderer.render(&input))
                .await
                .map_err(|err| BotError::Chart(err.to_string()))?;
            let png = match rendered {
                Ok(png) => png,
                Err(err) => {
                    warn!(%err, crane_id, fault = %fault_name, "chart render failed");
                    self.transport
                        .edit_text(chat, placeholder, &format!("Chart failed: {caption}"))
                        .await?;
                    continue;
                }
            };

            // Bounded retry on rate limits; the rendered bytes are reused,
            // never re-rendered.
            let attempts = self.settings.download_retries.max(1);
            for attempt in 1..=attempts {
                match self.transport.send_photo(chat, &caption, &png).await {
                    Ok(_) => break,
                    Err(TransportError::RateLimited { retry_after }) if attempt < attempts => {
                        warn!(chat, attempt, ?retry_after, "photo send rate limited");
                        tokio::time::sleep(retry_after).await;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            self.transport.delete_message(chat, placeholder).await?;
        }
        Ok(())
    }

    /// First half of the delete round trip: size the scope, refuse
    /// over-ceiling requests, otherwise ask for confirmation.
    async fn offer_delete(
        &self,
        chat: ChatId,
        crane: CraneScope,
        start: NaiveDate,
        end: NaiveDate,
        fault: FaultChoice,
    ) -> Result<(), BotError> {
        let count = self
            .router
            .count(start, end, crane.filter(), fault.filter())
            .await?;
        if count == 0 {
            return Err(BotError::Validation(
                "No data for the selected range.".to_string(),
            ));
        }
        if count > self.settings.bulk_delete_limit {
            return Err(BotError::Validation(format!(
                "Refusing to delete {count} records at once (limit {}).",
                self.settings.bulk_delete_limit
            )));
        }

        let crane_text = match crane {
            CraneScope::All => "ALL CRANES".to_string(),
            CraneScope::Id(id) => crane_label(id),
        };
        let fault_text = match fault {
            FaultChoice::All => "all faults".to_string(),
            FaultChoice::Id(id) => match self.faults.get(id).await? {
                Some(reference) => reference.label(),
                None => format!("fault {id}"),
            },
        };
        let text = format!(
            "⚠️ Delete {count} records?\nCrane: {crane_text}\nRange: {} to {}\nFault: {fault_text}",
            display_date(start),
            display_date(end)
        );
        let confirm = MenuState::ConfirmDelete {
            crane,
            start,
            end,
            fault,
        };
        let keyboard = Keyboard::new(vec![vec![
            Button::new("✅ DELETE", confirm.encode()),
            Button::new("❌ CANCEL", "cancel_delete"),
        ]]);
        self.transport.send_keyboard(chat, &text, &keyboard).await?;
        Ok(())
    }

    async fn run_confirmed_delete(
        &self,
        chat: ChatId,
        user: UserId,
        message: MessageId,
        crane: CraneScope,
        start: NaiveDate,
        end: NaiveDate,
        fault: FaultChoice,
    ) -> Result<(), BotError> {
        // The gate sits on the destructive press itself, so a forwarded or
        // replayed confirmation keyboard is useless to non-admins.
        if !self.authorizer.is_admin(user) {
            self.transport
                .edit_text(chat, message, &format!("Not authorized. Your id: {user}"))
                .await?;
            return Ok(());
        }
        let deleted = self
            .router
            .delete(start, end, crane.filter(), fault.filter())
            .await?;
        info!(chat, user, deleted, "bulk delete");
        self.transport
            .edit_text(chat, message, &format!("Deleted {deleted} records."))
            .await?;
        Ok(())
    }

    async fn handle_upload(
        &self,
        chat: ChatId,
        user: UserId,
        file_id: &str,
        file_name: &str,
        mime: &str,
    ) -> Result<(), BotError> {
        if !self.authorizer.is_admin(user) {
            return Err(BotError::Validation(format!(
                "Not authorized. Your id: {user}"
            )));
        }
        let kind = classify_upload(mime, file_name);
        if kind == UploadKind::Unsupported {
            return Err(BotError::Validation(
                "Unsupported file type. Upload a ZIP or RAR export, or a CSV fault library."
                    .to_string(),
            ));
        }

        let bytes = self.download_with_retry(file_id).await?;
        match kind {
            UploadKind::Archive(archive) => {
                let entries = self
                    .opener
                    .entries(&bytes, archive)
                    .map_err(|err| BotError::Archive(err.to_string()))?;
                let report = self
                    .ingestor
                    .ingest_entries(&entries)
                    .await
                    .map_err(|err| BotError::Archive(err.to_string()))?;
                info!(chat, files = report.files, rows = report.rows, "archive ingested");
                self.transport
                    .send_text(
                        chat,
                        &format!(
                            "Imported {} rows from {} files ({} skipped).",
                            report.rows, report.files, report.skipped
                        ),
                    )
                    .await?;
            }
            UploadKind::FaultLibrary => {
                let text = decode_export_bytes(&bytes);
                let imported = self
                    .ingestor
                    .import_fault_library(&text)
                    .await
                    .map_err(|err| BotError::Archive(err.to_string()))?;
                self.transport
                    .send_text(chat, &format!("Imported {imported} fault references."))
                    .await?;
            }
            UploadKind::Unsupported => unreachable!(),
        }
        Ok(())
    }

    /// Download an uploaded document, retrying timeouts a fixed number of
    /// times with a fixed delay.
    async fn download_with_retry(&self, file_id: &str) -> Result<Vec<u8>, BotError> {
        let attempts = self.settings.download_retries.max(1);
        let delay = Duration::from_secs(self.settings.download_retry_delay_secs);
        let mut last = None;
        for attempt in 1..=attempts {
            match self.transport.download_file(file_id).await {
                Ok(bytes) => return Ok(bytes),
                Err(TransportError::Timeout) => {
                    warn!(file_id, attempt, "download timed out");
                    last = Some(TransportError::Timeout);
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(last.unwrap_or(TransportError::Timeout).into())
    }
}

fn main_menu() -> Keyboard {
    Keyboard::new(vec![
        vec![Button::new("📋 Show data", "show_data")],
        vec![Button::new("📈 Show graph", "show_graph")],
        vec![Button::new("🗑 Delete data", "delete_data")],
        vec![Button::new("ℹ Help", "help")],
    ])
}

fn render_month_select(state: &MenuState) -> Result<(String, Keyboard), BotError> {
    let MenuState::MonthSelect { start, year, .. } = state else {
        return Err(BotError::Validation("Bad menu state.".to_string()));
    };
    let buttons = MONTH_NAMES
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| {
            state
                .month_token(idx as u32 + 1)
                .map(|token| Button::new(*name, token))
        })
        .collect();
    let text = match start {
        None => format!("Pick the start month of {year}:"),
        Some(_) => format!("Pick the end month of {year}:"),
    };
    Ok((text, Keyboard::grid(buttons, MONTHS_PER_ROW)))
}
