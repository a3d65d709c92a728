// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::widgets::{
    Axis, Block, Borders, Cell, Chart, Clear, Dataset, GraphType, Paragraph, Row, Table, Tabs,
    Wrap,
};
use smartstock_app::{
    AgentHealth, AgentReply, AgentTool, AppCommand, AppEvent, AppState, BulkPhase,
    BulkStatusForm, BulkStatusUpdate, BulkStatusUpdateResult, ChatRole, ChatTurn,
    ChatVisibility, DEFAULT_PAGE_SIZE, DashboardKpis, FetchTicket, ForecastItem, ForecastList,
    ForecastQuery, ForecastSortKey, ForecastStatus, HISTORY_DAYS, InventoryTurnover, ListRow,
    ListView, MAX_PAGE_SIZE, ModalKind, NewOrder, Order, OrderField, OrderFormInput,
    OrderFormState, OrderSortKey, OtprMetrics, Page, PageRequest, PagedQuery, ProductId,
    RESTOCK_DAY, SortDirection, SortKey, SortState, StockChart, StockLevelPoint, TabKind, Tone,
    Transaction, TransactionList, TransactionQuery, TransactionSortKey, TransactionStatus,
    TransactionType, Warehouse, WarehouseId, next_page_size, prev_page_size, sort_orders,
    status_style,
};
use std::collections::BTreeSet;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(4);
const BULK_CLOSE_DELAY: Duration = Duration::from_millis(1500);
const CHAT_VISIBLE_LINES: usize = 14;
const SELECT_MARK: &str = "■";
const ASC_MARK: &str = "↑";
const DESC_MARK: &str = "↓";
const DATE_RANGES: [Option<i64>; 4] = [None, Some(7), Some(30), Some(90)];

const TRANSACTION_COLUMNS: [&str; 8] = [
    "", "number", "type", "product", "warehouse", "qty", "status", "time",
];
const FORECAST_COLUMNS: [&str; 7] = [
    "sku", "product", "warehouse", "stock", "forecast", "status", "action",
];
const ORDER_COLUMNS: [&str; 6] = ["order", "product", "qty", "requester", "status", "created"];
const WAREHOUSE_COLUMNS: [&str; 4] = ["id", "name", "location", "created"];

/// Data access for the dashboard. The CLI wires this to the HTTP client or
/// to the offline demo dataset.
pub trait AppRuntime {
    fn load_kpis(&mut self) -> Result<DashboardKpis>;
    fn load_transactions(&mut self, query: &TransactionQuery) -> Result<Page<Transaction>>;
    fn load_forecast(&mut self, query: &ForecastQuery) -> Result<Page<ForecastItem>>;
    fn load_orders(&mut self) -> Result<Vec<Order>>;
    fn load_warehouses(&mut self, page: PageRequest) -> Result<Page<Warehouse>>;
    fn load_stock_history(
        &mut self,
        item: &ForecastItem,
        days: u32,
    ) -> Result<Vec<StockLevelPoint>>;
    fn bulk_update_status(&mut self, update: &BulkStatusUpdate)
    -> Result<BulkStatusUpdateResult>;
    fn resolve_product(&mut self, sku: &str) -> Result<ProductId>;
    fn create_order(&mut self, order: &NewOrder) -> Result<Order>;
    fn send_chat(&mut self, transcript: &[ChatTurn]) -> Result<AgentReply>;
    fn agent_health(&mut self) -> Result<AgentHealth>;
    fn agent_tools(&mut self) -> Result<Vec<AgentTool>>;

    fn today(&self) -> Date {
        OffsetDateTime::now_utc().date()
    }

    /// Delivers the agent reply as an `InternalEvent::ChatReply`. The default
    /// runs inline; network-backed runtimes override this to use a thread.
    fn spawn_chat(
        &mut self,
        request_id: u64,
        transcript: &[ChatTurn],
        internal_tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let result = self
            .send_chat(transcript)
            .map_err(|error| format!("{error:#}"));
        internal_tx
            .send(InternalEvent::ChatReply { request_id, result })
            .map_err(|_| anyhow!("chat event channel closed"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    CloseBulkModal {
        token: u64,
    },
    ChatReply {
        request_id: u64,
        result: std::result::Result<AgentReply, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiOptions {
    pub page_size: u32,
    pub requested_by: String,
    pub chat_enabled: bool,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            requested_by: String::new(),
            chat_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TableCursor {
    row: usize,
    col: usize,
}

#[derive(Debug, Clone)]
struct OrdersUiState {
    rows: Vec<Order>,
    sort: SortState<OrderSortKey>,
    error: Option<String>,
}

impl Default for OrdersUiState {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            sort: SortState::new(OrderSortKey::Created),
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct WarehousesUiState {
    page: PageRequest,
    data: Option<Page<Warehouse>>,
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOption {
    Status(TransactionStatus),
    Kind(TransactionType),
    Warehouse(WarehouseId),
    DateRange,
    ForecastWarehouse,
    ForecastStatus,
    ClearAll,
}

#[derive(Debug, Clone)]
struct ChartUiState {
    item: ForecastItem,
    chart: StockChart,
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ChatLine {
    role: ChatRole,
    body: String,
    // Shown in the transcript but never sent back to the agent.
    local: bool,
}

#[derive(Debug, Clone, Default)]
struct ChatUiState {
    transcript: Vec<ChatLine>,
    input: String,
    history: Vec<String>,
    history_cursor: Option<usize>,
    history_buffer: String,
    next_request_id: u64,
    in_flight: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatCommand {
    Clear,
    Health,
    Tools,
    Help,
}

/// Somewhere a frame can be drawn. Lists paint through it between issuing
/// a fetch and receiving the page so the loading title is on screen.
trait Screen {
    fn show(&mut self, state: &AppState, view_data: &ViewData) -> Result<()>;
}

impl<B: Backend> Screen for Terminal<B> {
    fn show(&mut self, state: &AppState, view_data: &ViewData) -> Result<()> {
        self.draw(|frame| render(frame, state, view_data))
            .context("draw frame")?;
        Ok(())
    }
}

impl std::fmt::Debug for dyn Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Screen")
    }
}

#[derive(Debug)]
struct ViewData {
    options: UiOptions,
    screen: Option<Box<dyn Screen>>,
    today: Date,
    kpis: Option<DashboardKpis>,
    transactions: TransactionList,
    forecast: ForecastList,
    orders: OrdersUiState,
    warehouses: WarehousesUiState,
    warehouse_options: Vec<Warehouse>,
    cursors: [TableCursor; 4],
    filter_cursor: usize,
    bulk: Option<BulkStatusForm>,
    chart: Option<ChartUiState>,
    order_form: Option<OrderFormState>,
    created_order: Option<Order>,
    chat: ChatUiState,
    status_token: u64,
    bulk_token: u64,
}

impl ViewData {
    fn new(options: UiOptions) -> Self {
        let page = PageRequest::new(0, options.page_size);
        Self {
            today: OffsetDateTime::now_utc().date(),
            kpis: None,
            transactions: TransactionList::new(TransactionQuery {
                page,
                ..TransactionQuery::default()
            }),
            forecast: ForecastList::new(ForecastQuery {
                page,
                ..ForecastQuery::default()
            }),
            orders: OrdersUiState::default(),
            warehouses: WarehousesUiState {
                page,
                ..WarehousesUiState::default()
            },
            warehouse_options: Vec::new(),
            cursors: [TableCursor::default(); 4],
            filter_cursor: 0,
            bulk: None,
            chart: None,
            order_form: None,
            created_order: None,
            chat: ChatUiState::default(),
            status_token: 0,
            bulk_token: 0,
            screen: None,
            options,
        }
    }

    fn cursor(&self, tab: TabKind) -> TableCursor {
        self.cursors[tab_index(tab)]
    }

    fn cursor_mut(&mut self, tab: TabKind) -> &mut TableCursor {
        &mut self.cursors[tab_index(tab)]
    }

    fn warehouse_name(&self, id: WarehouseId) -> String {
        self.warehouse_options
            .iter()
            .find(|warehouse| warehouse.warehouse_id == id)
            .map_or_else(|| format!("#{id}"), |warehouse| warehouse.name.clone())
    }
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    options: UiOptions,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let result = execute!(io::stdout(), terminal::EnterAlternateScreen)
        .context("enter alternate screen")
        .and_then(|()| drive_terminal(state, runtime, options));

    // Restore the terminal whatever ended the session.
    let restored = disable_raw_mode()
        .context("disable raw mode")
        .and_then(|()| {
            execute!(io::stdout(), terminal::LeaveAlternateScreen)
                .context("leave alternate screen")
        });
    result.and(restored)
}

fn drive_terminal<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    options: UiOptions,
) -> Result<()> {
    let backend = CrosstermBackend::new(io::stdout());
    let terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(options);
    view_data.screen = Some(Box::new(terminal));
    let (internal_tx, internal_rx) = mpsc::channel();
    event_loop(
        state,
        runtime,
        &mut view_data,
        &internal_tx,
        &internal_rx,
        next_terminal_event,
    )
}

/// Runs until a key asks to quit. Any draw or input error ends the loop and
/// is returned to the caller, which still owns terminal restoration.
fn event_loop<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    internal_rx: &Receiver<InternalEvent>,
    mut next_event: impl FnMut() -> Result<Option<Event>>,
) -> Result<()> {
    initial_load(state, runtime, view_data, internal_tx);
    loop {
        process_internal_events(state, view_data, internal_tx, internal_rx);
        paint(state, view_data)?;

        let Some(event) = next_event()? else {
            continue;
        };
        if let Event::Key(key) = event
            && handle_key_event(state, runtime, view_data, internal_tx, key)
        {
            return Ok(());
        }
    }
}

fn next_terminal_event() -> Result<Option<Event>> {
    if !event::poll(Duration::from_millis(120)).context("poll event")? {
        return Ok(None);
    }
    event::read().context("read event").map(Some)
}

fn paint(state: &AppState, view_data: &mut ViewData) -> Result<()> {
    let Some(mut screen) = view_data.screen.take() else {
        return Ok(());
    };
    let result = screen.show(state, view_data);
    view_data.screen = Some(screen);
    result
}

fn initial_load<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    view_data.today = runtime.today();
    match runtime.load_warehouses(PageRequest::new(0, MAX_PAGE_SIZE)) {
        Ok(page) => view_data.warehouse_options = page.items,
        Err(error) => {
            tracing::warn!(error = %format!("{error:#}"), "warehouse lookup failed");
        }
    }
    refresh_all(state, runtime, view_data, internal_tx);
}

fn refresh_all<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let kpis = refresh_kpis(runtime, view_data);
    let tab = load_tab(state, state.active_tab, runtime, view_data);
    match kpis.and(tab) {
        Ok(()) => emit_status(state, view_data, internal_tx, "refreshed"),
        Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
    }
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::CloseBulkModal { token } if token == view_data.bulk_token => {
                settle_bulk_modal(state, view_data);
            }
            InternalEvent::CloseBulkModal { .. } => {}
            InternalEvent::ChatReply { request_id, result } => {
                handle_chat_reply(state, view_data, internal_tx, request_id, result);
            }
        }
    }
}

fn settle_bulk_modal(state: &mut AppState, view_data: &mut ViewData) {
    let succeeded = view_data
        .bulk
        .as_ref()
        .is_some_and(|form| matches!(form.phase, BulkPhase::Succeeded { .. }));
    if !succeeded {
        return;
    }
    view_data.bulk = None;
    view_data.transactions.clear_selection();
    if state.modal == Some(ModalKind::BulkStatus) {
        state.dispatch(AppCommand::CloseModal);
    }
}

fn handle_chat_reply(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    request_id: u64,
    result: std::result::Result<AgentReply, String>,
) {
    if view_data.chat.in_flight != Some(request_id) {
        return;
    }
    view_data.chat.in_flight = None;

    match result {
        Ok(reply) => {
            let local = reply.is_error();
            view_data.chat.transcript.push(ChatLine {
                role: ChatRole::Assistant,
                body: reply.display_text(),
                local,
            });
        }
        Err(error) => {
            tracing::warn!(%error, "agent request failed");
            let message = format!("chat failed: {error}");
            view_data.chat.transcript.push(ChatLine {
                role: ChatRole::Assistant,
                body: message.clone(),
                local: true,
            });
            emit_status(state, view_data, internal_tx, message);
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_DELAY);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn schedule_bulk_close(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(BULK_CLOSE_DELAY);
        let _ = sender.send(InternalEvent::CloseBulkModal { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if let Some(modal) = state.modal {
        match modal {
            ModalKind::Help => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Enter) {
                    state.dispatch(AppCommand::CloseModal);
                }
            }
            ModalKind::Filters => handle_filter_key(state, runtime, view_data, internal_tx, key),
            ModalKind::BulkStatus => handle_bulk_key(state, runtime, view_data, internal_tx, key),
            ModalKind::ForecastChart => handle_chart_key(state, view_data, key),
            ModalKind::CreateOrder => {
                handle_order_form_key(state, runtime, view_data, internal_tx, key);
            }
            ModalKind::OrderSuccess => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                    view_data.created_order = None;
                    state.dispatch(AppCommand::CloseModal);
                }
            }
        }
        return false;
    }

    if state.chat == ChatVisibility::Visible {
        handle_chat_overlay_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    match key.code {
        KeyCode::Tab => {
            dispatch_and_refresh(state, runtime, view_data, AppCommand::NextTab, internal_tx);
        }
        KeyCode::BackTab => {
            dispatch_and_refresh(state, runtime, view_data, AppCommand::PrevTab, internal_tx);
        }
        KeyCode::Down => move_row(state.active_tab, view_data, 1),
        KeyCode::Up => move_row(state.active_tab, view_data, -1),
        KeyCode::Left => move_col(state.active_tab, view_data, -1),
        KeyCode::Right => move_col(state.active_tab, view_data, 1),
        KeyCode::Enter => open_chart(state, runtime, view_data, internal_tx),
        KeyCode::Esc => {
            if view_data.transactions.selection_len() > 0 {
                view_data.transactions.clear_selection();
                emit_status(state, view_data, internal_tx, "selection cleared");
            }
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            handle_nav_char(state, runtime, view_data, internal_tx, ch);
        }
        _ => {}
    }
    false
}

fn handle_nav_char<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    ch: char,
) {
    let tab = state.active_tab;
    match ch {
        '1'..='4' => {
            let index = ch as usize - '1' as usize;
            dispatch_and_refresh(
                state,
                runtime,
                view_data,
                AppCommand::SelectTab(TabKind::ALL[index]),
                internal_tx,
            );
        }
        'j' => move_row(tab, view_data, 1),
        'k' => move_row(tab, view_data, -1),
        'h' => move_col(tab, view_data, -1),
        'l' => move_col(tab, view_data, 1),
        'g' => view_data.cursor_mut(tab).row = 0,
        'G' => {
            let last = row_count(tab, view_data).saturating_sub(1);
            view_data.cursor_mut(tab).row = last;
        }
        's' => sort_current_column(state, runtime, view_data, internal_tx),
        'n' => change_page(state, runtime, view_data, internal_tx, true),
        'p' => change_page(state, runtime, view_data, internal_tx, false),
        '+' | '=' => change_page_size(state, runtime, view_data, internal_tx, next_page_size),
        '-' => change_page_size(state, runtime, view_data, internal_tx, prev_page_size),
        ' ' | 'x' => toggle_row_selection(state, view_data, internal_tx),
        'a' => {
            if tab == TabKind::Transactions {
                view_data.transactions.toggle_select_all();
                let count = view_data.transactions.selection_len();
                emit_status(state, view_data, internal_tx, format!("{count} selected"));
            }
        }
        'u' => open_bulk_modal(state, view_data, internal_tx),
        'f' => {
            if matches!(tab, TabKind::Transactions | TabKind::Forecast) {
                view_data.filter_cursor = 0;
                state.dispatch(AppCommand::OpenModal(ModalKind::Filters));
            } else {
                emit_status(state, view_data, internal_tx, "no filters on this tab");
            }
        }
        'o' => open_order_form(state, view_data, internal_tx),
        'r' => refresh_all(state, runtime, view_data, internal_tx),
        '@' => {
            if view_data.options.chat_enabled {
                dispatch_and_refresh(state, runtime, view_data, AppCommand::OpenChat, internal_tx);
            } else {
                emit_status(state, view_data, internal_tx, "chat disabled in config");
            }
        }
        '?' => {
            state.dispatch(AppCommand::OpenModal(ModalKind::Help));
        }
        _ => {}
    }
}

fn dispatch_and_refresh<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    command: AppCommand,
    internal_tx: &Sender<InternalEvent>,
) {
    let events = state.dispatch(command);
    if should_refresh_view(&events)
        && let Err(error) = load_tab(state, state.active_tab, runtime, view_data)
    {
        emit_status(state, view_data, internal_tx, format!("{error:#}"));
        return;
    }
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::StatusUpdated(_)))
    {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(internal_tx, view_data.status_token);
    }
}

fn should_refresh_view(events: &[AppEvent]) -> bool {
    events
        .iter()
        .any(|event| matches!(event, AppEvent::TabChanged(_)))
}

fn load_tab<R: AppRuntime>(
    state: &AppState,
    tab: TabKind,
    runtime: &mut R,
    view_data: &mut ViewData,
) -> Result<()> {
    match tab {
        TabKind::Transactions => fetch_transactions(state, runtime, view_data),
        TabKind::Forecast => fetch_forecast(state, runtime, view_data),
        TabKind::Orders => fetch_orders(runtime, view_data),
        TabKind::Warehouses => fetch_warehouses(runtime, view_data),
    }
}

fn refresh_kpis<R: AppRuntime>(runtime: &mut R, view_data: &mut ViewData) -> Result<()> {
    match runtime.load_kpis() {
        Ok(kpis) => {
            view_data.kpis = Some(kpis);
            Ok(())
        }
        Err(error) => {
            tracing::warn!(error = %format!("{error:#}"), "kpi load failed");
            Err(error.context("load kpis"))
        }
    }
}

/// Applies the outcome of a fetch issued with `begin_fetch`. A failure
/// clears the rows and is kept on the list for the empty-state message.
fn settle_fetch<Q, R>(
    list: &mut ListView<Q, R>,
    what: &str,
    ticket: FetchTicket,
    loaded: Result<Page<R>>,
) -> Result<()>
where
    Q: PagedQuery,
    R: ListRow,
    R::Id: Ord,
{
    match loaded {
        Ok(page) => {
            list.finish_fetch(ticket, Ok(page));
            Ok(())
        }
        Err(error) => {
            let message = format!("{error:#}");
            tracing::warn!(error = %message, what, "list load failed");
            list.finish_fetch(ticket, Err(message));
            Err(error.context(format!("load {what}")))
        }
    }
}

/// Paints the in-flight state. A failed paint only costs the indicator.
fn paint_loading(state: &AppState, view_data: &mut ViewData) {
    if let Err(error) = paint(state, view_data) {
        tracing::debug!(error = %format!("{error:#}"), "loading frame skipped");
    }
}

fn fetch_transactions<R: AppRuntime>(
    state: &AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) -> Result<()> {
    let request = view_data.transactions.begin_fetch();
    paint_loading(state, view_data);
    let loaded = runtime.load_transactions(&request.query);
    let result = settle_fetch(
        &mut view_data.transactions,
        "transactions",
        request.ticket,
        loaded,
    );
    clamp_cursor(TabKind::Transactions, view_data);
    result
}

fn fetch_forecast<R: AppRuntime>(
    state: &AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) -> Result<()> {
    let request = view_data.forecast.begin_fetch();
    paint_loading(state, view_data);
    let loaded = runtime.load_forecast(&request.query);
    let result = settle_fetch(&mut view_data.forecast, "forecast", request.ticket, loaded);
    clamp_cursor(TabKind::Forecast, view_data);
    result
}

fn fetch_orders<R: AppRuntime>(runtime: &mut R, view_data: &mut ViewData) -> Result<()> {
    let result = match runtime.load_orders() {
        Ok(mut rows) => {
            let sort = view_data.orders.sort;
            sort_orders(&mut rows, sort.key, sort.direction);
            view_data.orders.rows = rows;
            view_data.orders.error = None;
            Ok(())
        }
        Err(error) => {
            let message = format!("{error:#}");
            tracing::warn!(error = %message, what = "orders", "list load failed");
            view_data.orders.rows.clear();
            view_data.orders.error = Some(message);
            Err(error.context("load orders"))
        }
    };
    clamp_cursor(TabKind::Orders, view_data);
    result
}

fn fetch_warehouses<R: AppRuntime>(runtime: &mut R, view_data: &mut ViewData) -> Result<()> {
    let result = match runtime.load_warehouses(view_data.warehouses.page) {
        Ok(page) => {
            view_data.warehouses.data = Some(page);
            view_data.warehouses.error = None;
            Ok(())
        }
        Err(error) => {
            let message = format!("{error:#}");
            tracing::warn!(error = %message, what = "warehouses", "list load failed");
            view_data.warehouses.data = None;
            view_data.warehouses.error = Some(message);
            Err(error.context("load warehouses"))
        }
    };
    clamp_cursor(TabKind::Warehouses, view_data);
    result
}

fn tab_index(tab: TabKind) -> usize {
    TabKind::ALL
        .iter()
        .position(|candidate| *candidate == tab)
        .unwrap_or(0)
}

fn row_count(tab: TabKind, view_data: &ViewData) -> usize {
    match tab {
        TabKind::Transactions => view_data.transactions.rows().len(),
        TabKind::Forecast => view_data.forecast.rows().len(),
        TabKind::Orders => view_data.orders.rows.len(),
        TabKind::Warehouses => view_data
            .warehouses
            .data
            .as_ref()
            .map_or(0, |page| page.items.len()),
    }
}

const fn column_count(tab: TabKind) -> usize {
    match tab {
        TabKind::Transactions => TRANSACTION_COLUMNS.len(),
        TabKind::Forecast => FORECAST_COLUMNS.len(),
        TabKind::Orders => ORDER_COLUMNS.len(),
        TabKind::Warehouses => WAREHOUSE_COLUMNS.len(),
    }
}

fn clamp_cursor(tab: TabKind, view_data: &mut ViewData) {
    let rows = row_count(tab, view_data);
    let cursor = view_data.cursor_mut(tab);
    cursor.row = cursor.row.min(rows.saturating_sub(1));
}

fn move_row(tab: TabKind, view_data: &mut ViewData, delta: isize) {
    let rows = row_count(tab, view_data);
    if rows == 0 {
        return;
    }
    let cursor = view_data.cursor_mut(tab);
    cursor.row = cursor.row.saturating_add_signed(delta).min(rows - 1);
}

fn move_col(tab: TabKind, view_data: &mut ViewData, delta: isize) {
    let columns = column_count(tab);
    let cursor = view_data.cursor_mut(tab);
    cursor.col = cursor.col.saturating_add_signed(delta).min(columns - 1);
}

const fn transaction_sort_column(col: usize) -> Option<TransactionSortKey> {
    match col {
        3 => Some(TransactionSortKey::Product),
        4 => Some(TransactionSortKey::Warehouse),
        7 => Some(TransactionSortKey::Timestamp),
        _ => None,
    }
}

const fn forecast_sort_column(col: usize) -> Option<ForecastSortKey> {
    match col {
        1 => Some(ForecastSortKey::Product),
        3 => Some(ForecastSortKey::Stock),
        4 => Some(ForecastSortKey::Forecast),
        5 => Some(ForecastSortKey::Severity),
        _ => None,
    }
}

const fn order_sort_column(col: usize) -> Option<OrderSortKey> {
    match col {
        0 => Some(OrderSortKey::Number),
        1 => Some(OrderSortKey::Product),
        2 => Some(OrderSortKey::Quantity),
        4 => Some(OrderSortKey::Status),
        5 => Some(OrderSortKey::Created),
        _ => None,
    }
}

fn sort_status<K: SortKey>(sort: SortState<K>) -> String {
    format!("sorted by {} {}", sort.key.label(), sort.direction.as_str())
}

fn sort_current_column<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let tab = state.active_tab;
    let col = view_data.cursor(tab).col;
    let outcome = match tab {
        TabKind::Transactions => transaction_sort_column(col).map(|key| {
            view_data.transactions.click_sort(key);
            fetch_transactions(state, runtime, view_data)
                .map(|()| sort_status(view_data.transactions.sort()))
        }),
        TabKind::Forecast => forecast_sort_column(col).map(|key| {
            view_data.forecast.click_sort(key);
            fetch_forecast(state, runtime, view_data)
                .map(|()| sort_status(view_data.forecast.sort()))
        }),
        TabKind::Orders => order_sort_column(col).map(|key| {
            let orders = &mut view_data.orders;
            orders.sort.click(key);
            sort_orders(&mut orders.rows, orders.sort.key, orders.sort.direction);
            Ok(sort_status(orders.sort))
        }),
        TabKind::Warehouses => None,
    };

    let message = match outcome {
        Some(Ok(message)) => {
            view_data.cursor_mut(tab).row = 0;
            message
        }
        Some(Err(error)) => format!("{error:#}"),
        None => "column not sortable".to_owned(),
    };
    emit_status(state, view_data, internal_tx, message);
}

fn change_page<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    forward: bool,
) {
    let tab = state.active_tab;
    let moved = match tab {
        TabKind::Transactions => {
            let list = &mut view_data.transactions;
            if forward {
                list.next_page()
            } else {
                list.prev_page()
            }
        }
        TabKind::Forecast => {
            let list = &mut view_data.forecast;
            if forward {
                list.next_page()
            } else {
                list.prev_page()
            }
        }
        TabKind::Warehouses => {
            let warehouses = &mut view_data.warehouses;
            let pagination = warehouses.data.as_ref().map(|page| page.pagination);
            match (forward, pagination) {
                (true, Some(meta)) if meta.has_next => {
                    warehouses.page = warehouses.page.next();
                    true
                }
                (false, Some(meta)) if meta.has_prev => {
                    warehouses.page = warehouses.page.prev();
                    true
                }
                _ => false,
            }
        }
        TabKind::Orders => {
            emit_status(state, view_data, internal_tx, "orders are not paginated");
            return;
        }
    };

    if !moved {
        let edge = if forward { "last" } else { "first" };
        emit_status(state, view_data, internal_tx, format!("already on {edge} page"));
        return;
    }
    view_data.cursor_mut(tab).row = 0;
    if let Err(error) = load_tab(state, tab, runtime, view_data) {
        emit_status(state, view_data, internal_tx, format!("{error:#}"));
    }
}

fn change_page_size<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    step: fn(u32) -> u32,
) {
    let tab = state.active_tab;
    let (changed, limit) = match tab {
        TabKind::Transactions => {
            let limit = step(view_data.transactions.page().limit);
            (view_data.transactions.set_page_size(limit), limit)
        }
        TabKind::Forecast => {
            let limit = step(view_data.forecast.page().limit);
            (view_data.forecast.set_page_size(limit), limit)
        }
        TabKind::Warehouses => {
            let current = view_data.warehouses.page;
            let limit = step(current.limit);
            view_data.warehouses.page = current.resized(limit);
            (view_data.warehouses.page != current, limit)
        }
        TabKind::Orders => {
            emit_status(state, view_data, internal_tx, "orders are not paginated");
            return;
        }
    };
    if !changed {
        return;
    }
    let message = match load_tab(state, tab, runtime, view_data) {
        Ok(()) => format!("page size {limit}"),
        Err(error) => format!("{error:#}"),
    };
    emit_status(state, view_data, internal_tx, message);
}

fn toggle_row_selection(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if state.active_tab != TabKind::Transactions {
        return;
    }
    let row = view_data.cursor(TabKind::Transactions).row;
    let Some(id) = view_data
        .transactions
        .rows()
        .get(row)
        .map(|transaction| transaction.transaction_id)
    else {
        return;
    };
    view_data.transactions.toggle_selected(id);
    let count = view_data.transactions.selection_len();
    emit_status(state, view_data, internal_tx, format!("{count} selected"));
}

fn open_bulk_modal(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if state.active_tab != TabKind::Transactions {
        emit_status(state, view_data, internal_tx, "bulk update works on transactions");
        return;
    }
    match BulkStatusForm::new(view_data.transactions.selected_ids()) {
        Ok(form) => {
            view_data.bulk = Some(form);
            view_data.bulk_token = view_data.bulk_token.saturating_add(1);
            state.dispatch(AppCommand::OpenModal(ModalKind::BulkStatus));
        }
        Err(error) => emit_status(state, view_data, internal_tx, error.to_string()),
    }
}

fn handle_bulk_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(form) = view_data.bulk.as_mut() else {
        state.dispatch(AppCommand::CloseModal);
        return;
    };
    match key.code {
        KeyCode::Esc => {
            let succeeded = matches!(form.phase, BulkPhase::Succeeded { .. });
            view_data.bulk = None;
            view_data.bulk_token = view_data.bulk_token.saturating_add(1);
            if succeeded {
                view_data.transactions.clear_selection();
            }
            state.dispatch(AppCommand::CloseModal);
        }
        KeyCode::Down | KeyCode::Char('j') => form.cycle_target(1),
        KeyCode::Up | KeyCode::Char('k') => form.cycle_target(-1),
        KeyCode::Enter => submit_bulk(state, runtime, view_data, internal_tx),
        _ => {}
    }
}

fn submit_bulk<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(update) = view_data.bulk.as_mut().and_then(BulkStatusForm::submit) else {
        return;
    };

    match runtime.bulk_update_status(&update) {
        Ok(result) => {
            let message = if result.message.trim().is_empty() {
                format!("{} transactions updated", result.updated_count)
            } else {
                result.message
            };
            tracing::info!(
                count = result.updated_count,
                status = update.status.as_str(),
                "bulk status applied"
            );
            if let Some(form) = view_data.bulk.as_mut() {
                form.succeed(message.clone());
            }
            view_data.bulk_token = view_data.bulk_token.saturating_add(1);
            schedule_bulk_close(internal_tx, view_data.bulk_token);

            let refetch = fetch_transactions(state, runtime, view_data)
                .and(refresh_kpis(runtime, view_data));
            match refetch {
                Ok(()) => emit_status(state, view_data, internal_tx, message),
                Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
            }
        }
        Err(error) => {
            let message = format!("{error:#}");
            tracing::warn!(error = %message, "bulk status update failed");
            if let Some(form) = view_data.bulk.as_mut() {
                form.fail(message);
            }
        }
    }
}

fn selected_forecast(view_data: &ViewData) -> Option<ForecastItem> {
    let row = view_data.cursor(TabKind::Forecast).row;
    view_data.forecast.rows().get(row).cloned()
}

fn open_chart<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if state.active_tab != TabKind::Forecast {
        return;
    }
    let Some(item) = selected_forecast(view_data) else {
        emit_status(state, view_data, internal_tx, "no forecast row selected");
        return;
    };

    let (history, error) = match runtime.load_stock_history(&item, HISTORY_DAYS) {
        Ok(history) => (history, None),
        Err(error) => {
            let message = format!("{error:#}");
            tracing::warn!(error = %message, sku = %item.item_id, "stock history load failed");
            (Vec::new(), Some(message))
        }
    };
    let chart = StockChart::build(&item, history, view_data.today);
    view_data.chart = Some(ChartUiState { item, chart, error });
    state.dispatch(AppCommand::OpenModal(ModalKind::ForecastChart));
}

fn handle_chart_key(state: &mut AppState, view_data: &mut ViewData, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Enter => {
            view_data.chart = None;
            state.dispatch(AppCommand::CloseModal);
        }
        KeyCode::Char('o') => {
            if let Some(chart) = view_data.chart.take() {
                let input = OrderFormInput::prefill(&chart.item, &view_data.options.requested_by);
                view_data.order_form = Some(OrderFormState::new(input));
                state.dispatch(AppCommand::OpenModal(ModalKind::CreateOrder));
            }
        }
        _ => {}
    }
}

fn open_order_form(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if state.active_tab != TabKind::Forecast {
        emit_status(state, view_data, internal_tx, "orders start from a forecast row");
        return;
    }
    let Some(item) = selected_forecast(view_data) else {
        emit_status(state, view_data, internal_tx, "no forecast row selected");
        return;
    };
    let input = OrderFormInput::prefill(&item, &view_data.options.requested_by);
    view_data.order_form = Some(OrderFormState::new(input));
    state.dispatch(AppCommand::OpenModal(ModalKind::CreateOrder));
}

fn handle_order_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(form) = view_data.order_form.as_mut() else {
        state.dispatch(AppCommand::CloseModal);
        return;
    };
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            view_data.order_form = None;
            state.dispatch(AppCommand::CloseModal);
            emit_status(state, view_data, internal_tx, "order canceled");
        }
        (KeyCode::Tab | KeyCode::Down, _) => form.focus = form.focus.next(),
        (KeyCode::BackTab | KeyCode::Up, _) => form.focus = form.focus.prev(),
        (KeyCode::Backspace, _) => form.backspace(),
        (KeyCode::Enter, _) => submit_order(state, runtime, view_data, internal_tx),
        (KeyCode::Char(ch), modifiers)
            if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT =>
        {
            form.insert_char(ch);
        }
        _ => {}
    }
}

fn submit_order<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = view_data.order_form.as_mut() else {
        return;
    };
    if let Err(error) = form.input.validate() {
        form.error = Some(error.to_string());
        return;
    }

    let input = &form.input;
    let created = runtime
        .resolve_product(&input.sku)
        .and_then(|product_id| input.to_new_order(product_id))
        .and_then(|order| runtime.create_order(&order));

    match created {
        Ok(order) => {
            tracing::info!(order = %order.order_number, "order created");
            let message = format!("order {} created", order.order_number);
            view_data.order_form = None;
            view_data.created_order = Some(order);
            state.dispatch(AppCommand::OpenModal(ModalKind::OrderSuccess));

            let refetch = fetch_forecast(state, runtime, view_data)
                .and(fetch_transactions(state, runtime, view_data))
                .and(refresh_kpis(runtime, view_data));
            match refetch {
                Ok(()) => emit_status(state, view_data, internal_tx, message),
                Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
            }
        }
        Err(error) => {
            let message = format!("{error:#}");
            tracing::warn!(error = %message, "order creation failed");
            form.error = Some(message);
        }
    }
}

fn filter_options(tab: TabKind, view_data: &ViewData) -> Vec<FilterOption> {
    let mut options = Vec::new();
    match tab {
        TabKind::Transactions => {
            options.extend(TransactionStatus::ALL.into_iter().map(FilterOption::Status));
            options.extend(TransactionType::ALL.into_iter().map(FilterOption::Kind));
            options.extend(
                view_data
                    .warehouse_options
                    .iter()
                    .map(|warehouse| FilterOption::Warehouse(warehouse.warehouse_id)),
            );
            options.push(FilterOption::DateRange);
        }
        TabKind::Forecast => {
            options.push(FilterOption::ForecastWarehouse);
            options.push(FilterOption::ForecastStatus);
        }
        TabKind::Orders | TabKind::Warehouses => return options,
    }
    options.push(FilterOption::ClearAll);
    options
}

fn handle_filter_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let options = filter_options(state.active_tab, view_data);
    match key.code {
        KeyCode::Esc | KeyCode::Char('f') => {
            state.dispatch(AppCommand::CloseModal);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            let last = options.len().saturating_sub(1);
            view_data.filter_cursor = (view_data.filter_cursor + 1).min(last);
        }
        KeyCode::Up | KeyCode::Char('k') => {
            view_data.filter_cursor = view_data.filter_cursor.saturating_sub(1);
        }
        KeyCode::Char(' ') | KeyCode::Enter => {
            let Some(option) = options.get(view_data.filter_cursor).copied() else {
                return;
            };
            if !apply_filter_option(state.active_tab, view_data, option) {
                return;
            }
            view_data.cursor_mut(state.active_tab).row = 0;
            let message = match load_tab(state, state.active_tab, runtime, view_data) {
                Ok(()) => {
                    let count = active_filter_count(state.active_tab, view_data);
                    format!("{count} filters active")
                }
                Err(error) => format!("{error:#}"),
            };
            emit_status(state, view_data, internal_tx, message);
        }
        _ => {}
    }
}

fn toggle_member<T: Ord>(set: &mut BTreeSet<T>, value: T) {
    if !set.remove(&value) {
        set.insert(value);
    }
}

fn cycle_option<T: Copy + PartialEq>(current: Option<T>, values: &[T]) -> Option<T> {
    match current.and_then(|value| values.iter().position(|candidate| *candidate == value)) {
        None => values.first().copied(),
        Some(index) => values.get(index + 1).copied(),
    }
}

fn date_range_days(from: Option<Date>, today: Date) -> Option<i64> {
    from.map(|from| (today - from).whole_days())
}

fn date_range_label(days: Option<i64>) -> String {
    match days {
        None => "all time".to_owned(),
        Some(days) => format!("last {days} days"),
    }
}

/// Returns whether the query changed; an unchanged query never refetches.
fn apply_filter_option(tab: TabKind, view_data: &mut ViewData, option: FilterOption) -> bool {
    let today = view_data.today;
    let warehouse_ids = view_data
        .warehouse_options
        .iter()
        .map(|warehouse| warehouse.warehouse_id)
        .collect::<Vec<_>>();
    match (tab, option) {
        (TabKind::Transactions, FilterOption::ClearAll) => view_data
            .transactions
            .update_query(|query| query.filters = Default::default()),
        (TabKind::Forecast, FilterOption::ClearAll) => view_data
            .forecast
            .update_query(|query| query.filters = Default::default()),
        (_, FilterOption::Status(status)) => view_data
            .transactions
            .update_query(|query| toggle_member(&mut query.filters.statuses, status)),
        (_, FilterOption::Kind(kind)) => view_data
            .transactions
            .update_query(|query| toggle_member(&mut query.filters.types, kind)),
        (_, FilterOption::Warehouse(id)) => view_data
            .transactions
            .update_query(|query| toggle_member(&mut query.filters.warehouse_ids, id)),
        (_, FilterOption::DateRange) => view_data.transactions.update_query(|query| {
            let current = date_range_days(query.filters.date_from, today);
            let index = DATE_RANGES
                .iter()
                .position(|range| *range == current)
                .unwrap_or(0);
            let next = DATE_RANGES[(index + 1) % DATE_RANGES.len()];
            query.filters.date_from = next.map(|days| today - time::Duration::days(days));
            query.filters.date_to = None;
        }),
        (_, FilterOption::ForecastWarehouse) => view_data.forecast.update_query(|query| {
            query.filters.warehouse_id = cycle_option(query.filters.warehouse_id, &warehouse_ids);
        }),
        (_, FilterOption::ForecastStatus) => view_data.forecast.update_query(|query| {
            query.filters.status = cycle_option(query.filters.status, &ForecastStatus::ALL);
        }),
        (_, FilterOption::ClearAll) => false,
    }
}

fn active_filter_count(tab: TabKind, view_data: &ViewData) -> usize {
    match tab {
        TabKind::Transactions => view_data.transactions.query().filters.active_count(),
        TabKind::Forecast => view_data.forecast.query().filters.active_count(),
        TabKind::Orders | TabKind::Warehouses => 0,
    }
}

fn filter_option_label(option: FilterOption, view_data: &ViewData) -> String {
    let transaction_filters = &view_data.transactions.query().filters;
    let forecast_filters = &view_data.forecast.query().filters;
    let mark = |on: bool| if on { "[x]" } else { "[ ]" };
    match option {
        FilterOption::Status(status) => format!(
            "{} status {}",
            mark(transaction_filters.statuses.contains(&status)),
            status.as_str()
        ),
        FilterOption::Kind(kind) => format!(
            "{} type {}",
            mark(transaction_filters.types.contains(&kind)),
            kind.as_str()
        ),
        FilterOption::Warehouse(id) => format!(
            "{} warehouse {}",
            mark(transaction_filters.warehouse_ids.contains(&id)),
            view_data.warehouse_name(id)
        ),
        FilterOption::DateRange => format!(
            "    date range: {}",
            date_range_label(date_range_days(transaction_filters.date_from, view_data.today))
        ),
        FilterOption::ForecastWarehouse => format!(
            "    warehouse: {}",
            forecast_filters
                .warehouse_id
                .map_or_else(|| "all".to_owned(), |id| view_data.warehouse_name(id))
        ),
        FilterOption::ForecastStatus => format!(
            "    forecast status: {}",
            forecast_filters.status.map_or("all", ForecastStatus::as_str)
        ),
        FilterOption::ClearAll => "    clear all filters".to_owned(),
    }
}

fn handle_chat_overlay_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            dispatch_and_refresh(state, runtime, view_data, AppCommand::CloseChat, internal_tx);
        }
        (KeyCode::Up, _) => chat_history_prev(view_data),
        (KeyCode::Char('p'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            chat_history_prev(view_data);
        }
        (KeyCode::Down, _) => chat_history_next(view_data),
        (KeyCode::Char('n'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            chat_history_next(view_data);
        }
        (KeyCode::Enter, _) => submit_chat_input(state, runtime, view_data, internal_tx),
        (KeyCode::Backspace, _) => {
            view_data.chat.input.pop();
            view_data.chat.history_cursor = None;
        }
        (KeyCode::Char(ch), modifiers) => {
            if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT {
                view_data.chat.input.push(ch);
                view_data.chat.history_cursor = None;
            }
        }
        _ => {}
    }
}

fn parse_chat_command(input: &str) -> Option<ChatCommand> {
    match input.trim() {
        "/clear" => Some(ChatCommand::Clear),
        "/health" => Some(ChatCommand::Health),
        "/tools" => Some(ChatCommand::Tools),
        "/help" => Some(ChatCommand::Help),
        _ => None,
    }
}

fn push_local_reply(view_data: &mut ViewData, body: String) {
    view_data.chat.transcript.push(ChatLine {
        role: ChatRole::Assistant,
        body,
        local: true,
    });
}

fn submit_chat_input<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let input = view_data.chat.input.trim().to_owned();
    if input.is_empty() {
        return;
    }
    view_data.chat.input.clear();
    view_data.chat.history_cursor = None;
    view_data.chat.history_buffer.clear();
    if view_data.chat.history.last() != Some(&input) {
        view_data.chat.history.push(input.clone());
    }

    if let Some(command) = parse_chat_command(&input) {
        run_chat_command(state, runtime, view_data, internal_tx, command);
        return;
    }
    if input.starts_with('/') {
        emit_status(state, view_data, internal_tx, format!("unknown command {input}; try /help"));
        return;
    }

    view_data.chat.transcript.push(ChatLine {
        role: ChatRole::User,
        body: input,
        local: false,
    });
    let turns = view_data
        .chat
        .transcript
        .iter()
        .filter(|line| !line.local)
        .map(|line| ChatTurn {
            role: line.role,
            content: line.body.clone(),
        })
        .collect::<Vec<_>>();

    view_data.chat.next_request_id = view_data.chat.next_request_id.saturating_add(1);
    let request_id = view_data.chat.next_request_id;
    view_data.chat.in_flight = Some(request_id);
    if let Err(error) = runtime.spawn_chat(request_id, &turns, internal_tx.clone()) {
        view_data.chat.in_flight = None;
        let message = format!("chat failed: {error:#}");
        push_local_reply(view_data, message.clone());
        emit_status(state, view_data, internal_tx, message);
    }
}

fn run_chat_command<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: ChatCommand,
) {
    match command {
        ChatCommand::Clear => {
            view_data.chat.transcript.clear();
            view_data.chat.in_flight = None;
            emit_status(state, view_data, internal_tx, "chat cleared");
        }
        ChatCommand::Health => {
            let body = match runtime.agent_health() {
                Ok(health) => format_agent_health(&health),
                Err(error) => format!("health check failed: {error:#}"),
            };
            push_local_reply(view_data, body);
        }
        ChatCommand::Tools => {
            let body = match runtime.agent_tools() {
                Ok(tools) if tools.is_empty() => "agent exposes no tools".to_owned(),
                Ok(tools) => tools
                    .iter()
                    .map(|tool| format!("{}: {}", tool.name, tool.description))
                    .collect::<Vec<_>>()
                    .join("\n"),
                Err(error) => format!("tool listing failed: {error:#}"),
            };
            push_local_reply(view_data, body);
        }
        ChatCommand::Help => {
            push_local_reply(
                view_data,
                "/clear resets the conversation, /health checks the agent, /tools lists its tools"
                    .to_owned(),
            );
        }
    }
}

fn format_agent_health(health: &AgentHealth) -> String {
    let mut text = format!("agent {}", health.status);
    if let Some(kind) = &health.agent_type {
        text.push_str(&format!(" ({kind})"));
    }
    if !health.tools_available.is_empty() {
        text.push_str(&format!(" | tools: {}", health.tools_available.join(", ")));
    }
    if let Some(error) = &health.error {
        text.push_str(&format!(" | error: {error}"));
    }
    text
}

fn chat_history_prev(view_data: &mut ViewData) {
    if view_data.chat.history.is_empty() {
        return;
    }

    match view_data.chat.history_cursor {
        None => {
            view_data.chat.history_buffer = view_data.chat.input.clone();
            view_data.chat.history_cursor = Some(view_data.chat.history.len().saturating_sub(1));
        }
        Some(cursor) if cursor > 0 => {
            view_data.chat.history_cursor = Some(cursor - 1);
        }
        Some(_) => {}
    }

    if let Some(cursor) = view_data.chat.history_cursor {
        view_data.chat.input = view_data.chat.history[cursor].clone();
    }
}

fn chat_history_next(view_data: &mut ViewData) {
    let Some(cursor) = view_data.chat.history_cursor else {
        return;
    };

    if cursor + 1 < view_data.chat.history.len() {
        let next = cursor + 1;
        view_data.chat.history_cursor = Some(next);
        view_data.chat.input = view_data.chat.history[next].clone();
    } else {
        view_data.chat.history_cursor = None;
        view_data.chat.input = std::mem::take(&mut view_data.chat.history_buffer);
    }
}

// ---------------------------------------------------------------------------
// Rendering

#[derive(Debug, Clone, PartialEq, Eq)]
struct TableCell {
    text: String,
    tone: Option<Tone>,
}

impl TableCell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: None,
        }
    }

    fn status(raw: &str) -> Self {
        let style = status_style(raw);
        Self {
            text: format!("{} {}", style.icon, style.label),
            tone: Some(style.tone),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TableRowProjection {
    cells: Vec<TableCell>,
    marked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TableProjection {
    title: String,
    columns: Vec<String>,
    rows: Vec<TableRowProjection>,
    empty_message: String,
}

fn header_label<K: SortKey>(label: &str, key: Option<K>, sort: SortState<K>) -> String {
    match key {
        Some(key) if key == sort.key => {
            let arrow = match sort.direction {
                SortDirection::Asc => ASC_MARK,
                SortDirection::Desc => DESC_MARK,
            };
            format!("{label} {arrow}")
        }
        _ => label.to_owned(),
    }
}

fn list_title(name: &str, range: String, page_size: u32, filters: usize, loading: bool) -> String {
    let mut parts = vec![name.to_owned()];
    if !range.is_empty() {
        parts.push(range);
    }
    parts.push(format!("{page_size}/page"));
    if filters > 0 {
        parts.push(format!("{filters} filters"));
    }
    if loading {
        parts.push("loading…".to_owned());
    }
    parts.join(" | ")
}

fn empty_message(what: &str, error: Option<&str>) -> String {
    match error {
        Some(error) => format!("could not load {what}: {error} (press r to retry)"),
        None => format!("no {what} to show"),
    }
}

fn projection_for_tab(tab: TabKind, view_data: &ViewData) -> TableProjection {
    match tab {
        TabKind::Transactions => transaction_projection(view_data),
        TabKind::Forecast => forecast_projection(view_data),
        TabKind::Orders => order_projection(view_data),
        TabKind::Warehouses => warehouse_projection(view_data),
    }
}

fn transaction_projection(view_data: &ViewData) -> TableProjection {
    let list = &view_data.transactions;
    let sort = list.sort();
    let columns = TRANSACTION_COLUMNS
        .iter()
        .enumerate()
        .map(|(index, label)| header_label(label, transaction_sort_column(index), sort))
        .collect();
    let rows = list
        .rows()
        .iter()
        .map(|transaction| {
            let marked = list.is_selected(transaction.transaction_id);
            TableRowProjection {
                cells: vec![
                    TableCell::plain(if marked { SELECT_MARK } else { "" }),
                    TableCell::plain(&transaction.transaction_number),
                    TableCell::plain(transaction.transaction_type.as_str()),
                    TableCell::plain(&transaction.product),
                    TableCell::plain(&transaction.warehouse),
                    TableCell::plain(format_quantity_change(transaction.quantity_change)),
                    TableCell::status(transaction.status.as_str()),
                    TableCell::plain(format_timestamp(transaction.transaction_timestamp)),
                ],
                marked,
            }
        })
        .collect();

    let mut title = list_title(
        "transactions",
        list.range_label(),
        list.page().limit,
        list.query().filters.active_count(),
        list.is_loading(),
    );
    if list.selection_len() > 0 {
        title.push_str(&format!(" | {} selected", list.selection_len()));
    }
    TableProjection {
        title,
        columns,
        rows,
        empty_message: empty_message("transactions", list.last_error()),
    }
}

fn forecast_projection(view_data: &ViewData) -> TableProjection {
    let list = &view_data.forecast;
    let sort = list.sort();
    let columns = FORECAST_COLUMNS
        .iter()
        .enumerate()
        .map(|(index, label)| header_label(label, forecast_sort_column(index), sort))
        .collect();
    let rows = list
        .rows()
        .iter()
        .map(|item| TableRowProjection {
            cells: vec![
                TableCell::plain(&item.item_id),
                TableCell::plain(&item.item_name),
                TableCell::plain(&item.warehouse_name),
                TableCell::plain(item.stock.to_string()),
                TableCell::plain(item.forecast_30_days.to_string()),
                TableCell::status(item.status.as_str()),
                TableCell::plain(if item.action.is_empty() {
                    item.status.recommended_action()
                } else {
                    item.action.as_str()
                }),
            ],
            marked: false,
        })
        .collect();

    TableProjection {
        title: list_title(
            "forecast",
            list.range_label(),
            list.page().limit,
            list.query().filters.active_count(),
            list.is_loading(),
        ),
        columns,
        rows,
        empty_message: empty_message("forecast items", list.last_error()),
    }
}

fn order_projection(view_data: &ViewData) -> TableProjection {
    let orders = &view_data.orders;
    let columns = ORDER_COLUMNS
        .iter()
        .enumerate()
        .map(|(index, label)| header_label(label, order_sort_column(index), orders.sort))
        .collect();
    let rows = orders
        .rows
        .iter()
        .map(|order| TableRowProjection {
            cells: vec![
                TableCell::plain(&order.order_number),
                TableCell::plain(order_product_label(order)),
                TableCell::plain(order.quantity.to_string()),
                TableCell::plain(&order.requested_by),
                TableCell::status(order.status.as_str()),
                TableCell::plain(format_timestamp(order.created_at)),
            ],
            marked: false,
        })
        .collect();

    TableProjection {
        title: format!("orders | {} total", orders.rows.len()),
        columns,
        rows,
        empty_message: empty_message("orders", orders.error.as_deref()),
    }
}

fn warehouse_projection(view_data: &ViewData) -> TableProjection {
    let warehouses = &view_data.warehouses;
    let items = warehouses
        .data
        .as_ref()
        .map_or(&[][..], |page| page.items.as_slice());
    let rows = items
        .iter()
        .map(|warehouse| TableRowProjection {
            cells: vec![
                TableCell::plain(warehouse.warehouse_id.to_string()),
                TableCell::plain(&warehouse.name),
                TableCell::plain(warehouse.location.clone().unwrap_or_default()),
                TableCell::plain(format_timestamp(warehouse.created_at)),
            ],
            marked: false,
        })
        .collect();

    let range = warehouses.data.as_ref().map_or_else(String::new, |page| {
        let meta = page.pagination;
        if meta.total == 0 {
            "no results".to_owned()
        } else {
            let end = meta.offset + page.items.len() as u64;
            format!("showing {}-{end} of {}", meta.offset + 1, meta.total)
        }
    });
    TableProjection {
        title: list_title("warehouses", range, warehouses.page.limit, 0, false),
        columns: WAREHOUSE_COLUMNS.iter().map(|label| (*label).to_owned()).collect(),
        rows,
        empty_message: empty_message("warehouses", warehouses.error.as_deref()),
    }
}

fn order_product_label(order: &Order) -> String {
    match (&order.product_name, &order.product_sku) {
        (Some(name), Some(sku)) => format!("{name} ({sku})"),
        (Some(name), None) => name.clone(),
        (None, Some(sku)) => sku.clone(),
        (None, None) => format!("product #{}", order.product_id),
    }
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_else(|_| at.to_string())
}

fn format_quantity_change(quantity: i64) -> String {
    if quantity > 0 {
        format!("+{quantity}")
    } else {
        quantity.to_string()
    }
}

const fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Success => Color::Green,
        Tone::Info => Color::Cyan,
        Tone::Warning => Color::Yellow,
        Tone::Danger => Color::Red,
        Tone::Neutral => Color::Gray,
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let tab_titles = TabKind::ALL
        .iter()
        .enumerate()
        .map(|(index, tab)| format!("{} {}", index + 1, tab.label()))
        .collect::<Vec<String>>();
    let tabs = Tabs::new(tab_titles)
        .block(Block::default().title("smartstock").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(tab_index(state.active_tab));
    frame.render_widget(tabs, layout[0]);

    render_kpi_cards(frame, layout[1], view_data);
    render_table(frame, layout[2], state, view_data);

    let status_widget = Paragraph::new(status_text(state))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[3]);

    if state.chat == ChatVisibility::Visible {
        let area = centered_rect(80, 70, frame.area());
        frame.render_widget(Clear, area);
        let chat = Paragraph::new(render_chat_overlay_text(&view_data.chat))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title("inventory assistant (esc to close)")
                    .borders(Borders::ALL),
            );
        frame.render_widget(chat, area);
    }

    if let Some(modal) = state.modal {
        render_modal(frame, modal, state, view_data);
    }
}

fn status_text(state: &AppState) -> String {
    state.status_line.clone().unwrap_or_else(|| {
        "tab switch | j/k rows | h/l cols | s sort | n/p page | +/- size | f filter | @ chat | ? help"
            .to_owned()
    })
}

fn kpi_cards(kpis: Option<&DashboardKpis>) -> Vec<(&'static str, String, Color)> {
    let value = |pick: fn(&DashboardKpis) -> u64| {
        kpis.map_or_else(|| "-".to_owned(), |kpis| pick(kpis).to_string())
    };
    vec![
        ("txns", value(|k| k.transactions.total_transactions), Color::White),
        ("pending", value(|k| k.transactions.pending_transactions), Color::Yellow),
        ("shipped", value(|k| k.transactions.shipped_transactions), Color::Cyan),
        ("delivered", value(|k| k.transactions.delivered_transactions), Color::Green),
        ("low stock", value(|k| k.alerts.low_stock_items), Color::Yellow),
        ("out of stock", value(|k| k.alerts.out_of_stock_items), Color::Red),
        ("reorder", value(|k| k.alerts.reorder_needed_items), Color::Magenta),
        ("on-time", view_metric(kpis, |k| k.otpr.as_ref().map(otpr_text)), Color::Green),
        ("turnover", view_metric(kpis, |k| k.turnover.map(turnover_text)), Color::Blue),
        (
            "crit/warn",
            view_metric(kpis, |k| {
                k.critical
                    .map(|counts| format!("{}/{}", counts.critical, counts.warning))
            }),
            Color::LightRed,
        ),
    ]
}

/// "-" until KPIs load, "n/a" when the backend had no data for the metric.
fn view_metric(
    kpis: Option<&DashboardKpis>,
    pick: impl Fn(&DashboardKpis) -> Option<String>,
) -> String {
    kpis.map_or_else(
        || "-".to_owned(),
        |kpis| pick(kpis).unwrap_or_else(|| "n/a".to_owned()),
    )
}

fn otpr_text(otpr: &OtprMetrics) -> String {
    match otpr.otpr_last_30d {
        Some(rate) => format!("{rate:.1}% {}", otpr.trend_arrow()),
        None => "n/a".to_owned(),
    }
}

fn turnover_text(turnover: InventoryTurnover) -> String {
    match (
        turnover.overall_inventory_turnover,
        turnover.overall_days_on_hand,
    ) {
        (Some(ratio), Some(days)) => format!("{ratio:.1}x {days}d"),
        (Some(ratio), None) => format!("{ratio:.1}x"),
        (None, _) => "n/a".to_owned(),
    }
}

fn render_kpi_cards(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let cards = kpi_cards(view_data.kpis.as_ref());
    let count = cards.len() as u32;
    let slots = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(cards.iter().map(|_| Constraint::Ratio(1, count)))
        .split(area);
    for ((label, value, color), slot) in cards.into_iter().zip(slots.iter()) {
        let card = Paragraph::new(value)
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .block(Block::default().title(label).borders(Borders::ALL));
        frame.render_widget(card, *slot);
    }
}

fn render_table(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState, view_data: &ViewData) {
    let projection = projection_for_tab(state.active_tab, view_data);
    let block = Block::default()
        .title(projection.title.clone())
        .borders(Borders::ALL);

    if projection.rows.is_empty() {
        let empty = Paragraph::new(projection.empty_message.clone())
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true })
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let cursor = view_data.cursor(state.active_tab);
    let widths = vec![Constraint::Min(6); projection.columns.len().max(1)];
    let header = Row::new(projection.columns.iter().enumerate().map(|(index, label)| {
        let mut style = Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);
        if index == cursor.col {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        Cell::from(label.clone()).style(style)
    }));

    let rows = projection.rows.iter().enumerate().map(|(row_index, row)| {
        let selected_row = row_index == cursor.row;
        let cells = row
            .cells
            .iter()
            .enumerate()
            .map(|(column_index, cell)| {
                let mut style = Style::default();
                if let Some(tone) = cell.tone {
                    style = style.fg(tone_color(tone));
                }
                if row.marked {
                    style = style.add_modifier(Modifier::BOLD);
                }
                if selected_row {
                    style = style.bg(Color::DarkGray);
                }
                if selected_row && column_index == cursor.col {
                    style = Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD);
                }
                Cell::from(cell.text.clone()).style(style)
            })
            .collect::<Vec<_>>();
        Row::new(cells)
    });

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(block);
    frame.render_widget(table, area);
}

fn render_modal(
    frame: &mut ratatui::Frame<'_>,
    modal: ModalKind,
    state: &AppState,
    view_data: &ViewData,
) {
    let (width, height) = match modal {
        ModalKind::ForecastChart => (85, 75),
        ModalKind::Help => (70, 75),
        _ => (60, 60),
    };
    let area = centered_rect(width, height, frame.area());
    frame.render_widget(Clear, area);
    let block = Block::default().title(modal.title()).borders(Borders::ALL);

    let text = match modal {
        ModalKind::ForecastChart => {
            render_chart_modal(frame, area, block, view_data);
            return;
        }
        ModalKind::Filters => render_filter_overlay_text(state.active_tab, view_data),
        ModalKind::BulkStatus => render_bulk_overlay_text(view_data.bulk.as_ref()),
        ModalKind::CreateOrder => render_order_form_text(view_data.order_form.as_ref()),
        ModalKind::OrderSuccess => render_order_success_text(view_data.created_order.as_ref()),
        ModalKind::Help => help_overlay_text().to_owned(),
    };
    let body = Paragraph::new(text).wrap(Wrap { trim: false }).block(block);
    frame.render_widget(body, area);
}

fn render_filter_overlay_text(tab: TabKind, view_data: &ViewData) -> String {
    let mut lines = vec![
        format!("{} filters (space toggles, esc closes)", tab.label()),
        String::new(),
    ];
    for (index, option) in filter_options(tab, view_data).into_iter().enumerate() {
        let pointer = if index == view_data.filter_cursor { ">" } else { " " };
        lines.push(format!("{pointer} {}", filter_option_label(option, view_data)));
    }
    lines.join("\n")
}

fn render_bulk_overlay_text(form: Option<&BulkStatusForm>) -> String {
    let Some(form) = form else {
        return String::new();
    };
    let mut lines = vec![
        format!("{} transactions selected", form.ids().len()),
        String::new(),
    ];
    for status in TransactionStatus::ALL {
        let pointer = if status == form.target() { ">" } else { " " };
        let style = status_style(status.as_str());
        lines.push(format!("{pointer} {} {}", style.icon, style.label));
    }
    lines.push(String::new());
    lines.push(match &form.phase {
        BulkPhase::Editing => "j/k choose status | enter apply | esc cancel".to_owned(),
        BulkPhase::Submitting => "updating…".to_owned(),
        BulkPhase::Succeeded { message } => format!("✓ {message}"),
        BulkPhase::Failed { error } => format!("✗ {error} (enter to retry)"),
    });
    lines.join("\n")
}

fn render_order_form_text(form: Option<&OrderFormState>) -> String {
    let Some(form) = form else {
        return String::new();
    };
    let input = &form.input;
    let mut lines = vec![
        format!("product:   {} ({})", input.product_name, input.sku),
        format!("warehouse: {}", input.warehouse_name),
        String::new(),
    ];
    for field in OrderField::ALL {
        let pointer = if field == form.focus { ">" } else { " " };
        let cursor = if field == form.focus { "_" } else { "" };
        lines.push(format!(
            "{pointer} {:<13} {}{cursor}",
            field.label(),
            input.field(field)
        ));
    }
    lines.push(String::new());
    if let Some(error) = &form.error {
        lines.push(format!("✗ {error}"));
    }
    lines.push("tab next field | enter submit | esc cancel".to_owned());
    lines.join("\n")
}

fn render_order_success_text(order: Option<&Order>) -> String {
    let Some(order) = order else {
        return String::new();
    };
    let style = status_style(order.status.as_str());
    let mut lines = vec![
        format!("order:     {}", order.order_number),
        format!("product:   {}", order_product_label(order)),
        format!("quantity:  {}", order.quantity),
        format!("requester: {}", order.requested_by),
        format!("status:    {} {}", style.icon, style.label),
        format!("created:   {}", format_timestamp(order.created_at)),
    ];
    if let Some(price) = order.unit_price {
        lines.push(format!("unit price: {price:.2}"));
    }
    if let Some(notes) = &order.notes {
        lines.push(format!("notes:     {notes}"));
    }
    lines.push(String::new());
    lines.push("enter or esc to close".to_owned());
    lines.join("\n")
}

fn render_chart_modal(frame: &mut ratatui::Frame<'_>, area: Rect, block: Block<'_>, view_data: &ViewData) {
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let Some(state) = &view_data.chart else {
        return;
    };

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(4)])
        .split(inner);

    let today = view_data.today;
    let history = state.chart.history_series(today);
    let projection = state.chart.projection_series();
    let [x_min, x_max] = state.chart.x_bounds(today);
    let y_max = state.chart.y_max() * 1.1;

    let datasets = vec![
        Dataset::default()
            .name("history")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&history),
        Dataset::default()
            .name("projection")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Yellow))
            .data(&projection),
    ];
    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("days")
                .style(Style::default().fg(Color::Gray))
                .bounds([x_min, x_max])
                .labels(vec![
                    format!("{x_min:.0}"),
                    "today".to_owned(),
                    format!("+{x_max:.0}"),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("units")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, y_max])
                .labels(vec!["0".to_owned(), format!("{:.0}", y_max / 2.0), format!("{y_max:.0}")]),
        );
    frame.render_widget(chart, parts[0]);

    let info = Paragraph::new(chart_summary_text(state)).wrap(Wrap { trim: true });
    frame.render_widget(info, parts[1]);
}

fn chart_summary_text(state: &ChartUiState) -> String {
    let item = &state.item;
    let style = status_style(item.status.as_str());
    let mut lines = vec![
        format!(
            "{} {} @ {} | stock {} | 30d forecast {} | {} {}",
            item.item_id,
            item.item_name,
            item.warehouse_name,
            item.stock,
            item.forecast_30_days,
            style.icon,
            style.label
        ),
        match (state.chart.stockout_day(), state.chart.projection.iter().any(|p| p.restock)) {
            (_, true) => format!("restock arrives on day {RESTOCK_DAY}"),
            (Some(day), false) => format!("projected stockout in {day} days"),
            (None, false) => "no stockout within 30 days".to_owned(),
        },
    ];
    if let Some(error) = &state.error {
        lines.push(format!("history unavailable: {error}"));
    }
    lines.push("o create order | esc close".to_owned());
    lines.join("\n")
}

fn render_chat_overlay_text(chat: &ChatUiState) -> String {
    let mut lines = Vec::new();
    let in_flight = if chat.in_flight.is_some() {
        " | agent: thinking"
    } else {
        ""
    };
    lines.push(format!("history: {}{in_flight}", chat.history.len()));
    lines.push(String::new());

    let keep = chat.transcript.len().saturating_sub(CHAT_VISIBLE_LINES);
    for message in chat.transcript.iter().skip(keep) {
        let label = match message.role {
            ChatRole::User => "you",
            ChatRole::Assistant => "agent",
        };
        lines.push(format!("{label}: {}", message.body));
    }
    if chat.in_flight.is_some() {
        lines.push("agent: …".to_owned());
    }

    if chat.transcript.is_empty() && chat.in_flight.is_none() {
        lines.push("Ask about stock levels, orders, or alerts. /help lists commands.".to_owned());
    }

    lines.push(String::new());
    lines.push(format!("> {}", chat.input));
    lines.join("\n")
}

fn help_overlay_text() -> &'static str {
    "Navigation\n\
     tab / shift+tab   next / previous tab\n\
     1-4               jump to tab\n\
     j/k, up/down      move row\n\
     h/l, left/right   move column\n\
     g / G             first / last row\n\
     \n\
     Lists\n\
     s                 sort by current column (again to flip)\n\
     n / p             next / previous page\n\
     + / -             page size\n\
     f                 filters\n\
     r                 refresh\n\
     \n\
     Transactions\n\
     space             select row\n\
     a                 select all on page\n\
     u                 update status of selection\n\
     esc               clear selection\n\
     \n\
     Forecast\n\
     enter             stock chart\n\
     o                 create order\n\
     \n\
     @ chat | ? help | ctrl+q quit"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, FilterOption, InternalEvent, Screen, UiOptions, ViewData,
        apply_filter_option, event_loop, handle_key_event, help_overlay_text, initial_load,
        kpi_cards, paint, process_internal_events, render,
    };
    use anyhow::{Result, anyhow};
    use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use std::cell::RefCell;
    use std::rc::Rc;
    use smartstock_app::{
        AgentHealth, AgentReply, AgentTool, AppState, BulkPhase, BulkStatusUpdate,
        BulkStatusUpdateResult, ChatRole, ChatTurn, ChatVisibility, DashboardKpis, ForecastId,
        ForecastItem, ForecastQuery, ForecastSortKey, InventoryStatus, InventoryTurnover,
        ModalKind, NewOrder, Order, OrderId, OrderStatus, OtprMetrics, Page, PageRequest,
        PaginationMeta, PagedQuery, ProductId, SortDirection, StockLevelPoint, TabKind,
        Transaction, TransactionId, TransactionQuery, TransactionSortKey, TransactionStatus,
        TransactionType, Warehouse, WarehouseId,
    };
    use std::sync::mpsc::{self, Receiver, Sender};
    use time::Date;
    use time::macros::{date, datetime};

    #[derive(Debug, Default)]
    struct TestRuntime {
        transactions: Vec<Transaction>,
        forecast: Vec<ForecastItem>,
        transaction_loads: Vec<TransactionQuery>,
        forecast_loads: Vec<ForecastQuery>,
        fail_transactions: Option<String>,
        bulk_calls: Vec<BulkStatusUpdate>,
        bulk_error: Option<String>,
        created_orders: Vec<NewOrder>,
        history_error: Option<String>,
        chat_calls: Vec<Vec<ChatTurn>>,
    }

    fn window<T: Clone>(rows: &[T], page: PageRequest) -> Page<T> {
        let items = rows
            .iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Page {
            items,
            pagination: PaginationMeta::for_window(rows.len() as u64, page.limit, page.offset),
        }
    }

    impl AppRuntime for TestRuntime {
        fn load_kpis(&mut self) -> Result<DashboardKpis> {
            Ok(DashboardKpis::default())
        }

        fn load_transactions(&mut self, query: &TransactionQuery) -> Result<Page<Transaction>> {
            self.transaction_loads.push(query.clone());
            if let Some(error) = &self.fail_transactions {
                return Err(anyhow!("{error}"));
            }
            Ok(window(&self.transactions, query.page))
        }

        fn load_forecast(&mut self, query: &ForecastQuery) -> Result<Page<ForecastItem>> {
            self.forecast_loads.push(query.clone());
            Ok(window(&self.forecast, query.page))
        }

        fn load_orders(&mut self) -> Result<Vec<Order>> {
            Ok(Vec::new())
        }

        fn load_warehouses(&mut self, page: PageRequest) -> Result<Page<Warehouse>> {
            let warehouses = vec![
                Warehouse {
                    warehouse_id: WarehouseId::new(1),
                    name: "Lyon".to_owned(),
                    location: Some("Lyon, FR".to_owned()),
                    created_at: datetime!(2025-01-01 0:00 UTC),
                    updated_at: datetime!(2025-01-01 0:00 UTC),
                },
                Warehouse {
                    warehouse_id: WarehouseId::new(2),
                    name: "Hamburg".to_owned(),
                    location: None,
                    created_at: datetime!(2025-01-01 0:00 UTC),
                    updated_at: datetime!(2025-01-01 0:00 UTC),
                },
            ];
            Ok(window(&warehouses, page))
        }

        fn load_stock_history(
            &mut self,
            _item: &ForecastItem,
            days: u32,
        ) -> Result<Vec<StockLevelPoint>> {
            if let Some(error) = &self.history_error {
                return Err(anyhow!("{error}"));
            }
            Ok((0..days)
                .map(|day| StockLevelPoint {
                    date: self.today() - time::Duration::days(i64::from(days - day)),
                    stock_level: 100 - i64::from(day),
                })
                .collect())
        }

        fn bulk_update_status(
            &mut self,
            update: &BulkStatusUpdate,
        ) -> Result<BulkStatusUpdateResult> {
            self.bulk_calls.push(update.clone());
            if let Some(error) = &self.bulk_error {
                return Err(anyhow!("{error}"));
            }
            Ok(BulkStatusUpdateResult {
                updated_count: update.transaction_ids.len() as u64,
                message: format!("Updated {} transactions", update.transaction_ids.len()),
            })
        }

        fn resolve_product(&mut self, sku: &str) -> Result<ProductId> {
            if sku.starts_with("SKU-") {
                Ok(ProductId::new(500))
            } else {
                Err(anyhow!("no product with SKU {sku}"))
            }
        }

        fn create_order(&mut self, order: &NewOrder) -> Result<Order> {
            self.created_orders.push(order.clone());
            Ok(Order {
                order_id: OrderId::new(1),
                order_number: "ORD-0001".to_owned(),
                product_id: order.product_id,
                quantity: order.quantity,
                warehouse_id: Some(order.warehouse_id),
                requested_by: order.requested_by.clone(),
                status: OrderStatus::Pending,
                notes: order.notes.clone(),
                forecast_id: order.forecast_id,
                created_at: datetime!(2025-06-02 12:00 UTC),
                updated_at: datetime!(2025-06-02 12:00 UTC),
                product_name: Some("Chain".to_owned()),
                product_sku: Some("SKU-1".to_owned()),
                unit_price: Some(12.5),
            })
        }

        fn send_chat(&mut self, transcript: &[ChatTurn]) -> Result<AgentReply> {
            self.chat_calls.push(transcript.to_vec());
            Ok(AgentReply {
                message_id: "agent-1".to_owned(),
                content: "2 items need reorder".to_owned(),
                status: "completed".to_owned(),
                error: None,
                tool_calls: Vec::new(),
            })
        }

        fn agent_health(&mut self) -> Result<AgentHealth> {
            Ok(AgentHealth {
                status: "healthy".to_owned(),
                agent_type: Some("inventory".to_owned()),
                tools_available: vec!["get_alerts".to_owned()],
                error: None,
            })
        }

        fn agent_tools(&mut self) -> Result<Vec<AgentTool>> {
            Ok(vec![AgentTool {
                name: "get_alerts".to_owned(),
                description: "list stock alerts".to_owned(),
            }])
        }

        fn today(&self) -> Date {
            date!(2025 - 06 - 02)
        }
    }

    fn transaction(id: i64) -> Transaction {
        Transaction {
            transaction_id: TransactionId::new(id),
            transaction_number: format!("TXN-{id:04}"),
            product: "Chain".to_owned(),
            quantity_change: 4,
            warehouse: "Lyon".to_owned(),
            transaction_type: TransactionType::Inbound,
            transaction_timestamp: datetime!(2025-06-01 8:30 UTC),
            status: TransactionStatus::Pending,
            notes: None,
        }
    }

    fn forecast(id: i64, stock: i64, demand: i64) -> ForecastItem {
        let status = InventoryStatus::classify(stock, demand, false);
        ForecastItem {
            forecast_id: ForecastId::new(id),
            item_id: format!("SKU-{id}"),
            item_name: "Chain".to_owned(),
            stock,
            forecast_30_days: demand,
            warehouse_id: WarehouseId::new(1),
            warehouse_name: "Lyon".to_owned(),
            warehouse_location: "Lyon, FR".to_owned(),
            status,
            action: status.recommended_action().to_owned(),
        }
    }

    fn runtime_with(transactions: i64, forecast_rows: i64) -> TestRuntime {
        TestRuntime {
            transactions: (1..=transactions).map(transaction).collect(),
            forecast: (1..=forecast_rows).map(|id| forecast(id, 5, 60)).collect(),
            ..TestRuntime::default()
        }
    }

    fn internal_channel() -> (Sender<InternalEvent>, Receiver<InternalEvent>) {
        mpsc::channel()
    }

    fn loaded_view(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        tx: &Sender<InternalEvent>,
    ) -> ViewData {
        let mut view_data = ViewData::new(UiOptions {
            requested_by: "elena".to_owned(),
            ..UiOptions::default()
        });
        initial_load(state, runtime, &mut view_data, tx);
        view_data
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn run_key_script(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        tx: &Sender<InternalEvent>,
        keys: &[KeyEvent],
    ) {
        for key in keys {
            assert!(!handle_key_event(state, runtime, view_data, tx, *key));
        }
    }

    fn type_text(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        tx: &Sender<InternalEvent>,
        text: &str,
    ) {
        let keys = text.chars().map(|ch| key(KeyCode::Char(ch))).collect::<Vec<_>>();
        run_key_script(state, runtime, view_data, tx, &keys);
    }

    #[test]
    fn initial_load_fetches_the_active_tab_once() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(60, 0);
        let (tx, _rx) = internal_channel();
        let view_data = loaded_view(&mut state, &mut runtime, &tx);

        assert_eq!(runtime.transaction_loads.len(), 1);
        assert_eq!(view_data.transactions.rows().len(), 25);
        assert_eq!(view_data.warehouse_options.len(), 2);
        assert!(runtime.forecast_loads.is_empty());
    }

    #[test]
    fn sorting_a_column_fetches_once_from_the_first_page() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(60, 0);
        let (tx, _rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Char('n'))],
        );
        assert_eq!(runtime.transaction_loads.last().map(|q| q.page.offset), Some(25));

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[
                key(KeyCode::Char('l')),
                key(KeyCode::Char('l')),
                key(KeyCode::Char('l')),
                key(KeyCode::Char('s')),
            ],
        );
        assert_eq!(runtime.transaction_loads.len(), 3);
        let last = runtime.transaction_loads.last().expect("sorted fetch");
        assert_eq!(last.sort.key, TransactionSortKey::Product);
        assert_eq!(last.sort.direction, SortDirection::Asc);
        assert_eq!(last.page().offset, 0);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Char('s'))],
        );
        let flipped = runtime.transaction_loads.last().expect("flipped fetch");
        assert_eq!(flipped.sort.direction, SortDirection::Desc);
    }

    #[test]
    fn unsortable_column_does_not_fetch() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(10, 0);
        let (tx, _rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Char('l')), key(KeyCode::Char('s'))],
        );
        assert_eq!(runtime.transaction_loads.len(), 1);
        assert_eq!(state.status_line.as_deref(), Some("column not sortable"));
    }

    #[test]
    fn page_size_change_keeps_the_containing_page() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(200, 0);
        let (tx, _rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[
                key(KeyCode::Char('n')),
                key(KeyCode::Char('n')),
                key(KeyCode::Char('n')),
                key(KeyCode::Char('+')),
            ],
        );
        let last = runtime.transaction_loads.last().expect("resized fetch");
        assert_eq!(last.page, PageRequest::new(50, 50));
    }

    #[test]
    fn toggling_a_filter_fetches_once_with_the_filter() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(40, 0);
        let (tx, _rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Char('n')), key(KeyCode::Char('f'))],
        );
        assert_eq!(state.modal, Some(ModalKind::Filters));
        let before = runtime.transaction_loads.len();

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Char(' '))],
        );
        assert_eq!(runtime.transaction_loads.len(), before + 1);
        let last = runtime.transaction_loads.last().expect("filtered fetch");
        assert!(last.filters.statuses.contains(&TransactionStatus::Pending));
        assert_eq!(last.page.offset, 0);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Esc)],
        );
        assert_eq!(state.modal, None);
    }

    #[test]
    fn date_range_option_cycles_through_presets() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(5, 0);
        let (tx, _rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);

        assert!(apply_filter_option(
            TabKind::Transactions,
            &mut view_data,
            FilterOption::DateRange
        ));
        assert_eq!(
            view_data.transactions.query().filters.date_from,
            Some(date!(2025 - 05 - 26))
        );
        for _ in 0..3 {
            apply_filter_option(TabKind::Transactions, &mut view_data, FilterOption::DateRange);
        }
        assert_eq!(view_data.transactions.query().filters.date_from, None);
    }

    #[test]
    fn forecast_warehouse_filter_cycles_back_to_all() {
        let mut state = AppState {
            active_tab: TabKind::Forecast,
            ..AppState::default()
        };
        let mut runtime = runtime_with(0, 3);
        let (tx, _rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);

        let option = FilterOption::ForecastWarehouse;
        apply_filter_option(TabKind::Forecast, &mut view_data, option);
        assert_eq!(
            view_data.forecast.query().filters.warehouse_id,
            Some(WarehouseId::new(1))
        );
        apply_filter_option(TabKind::Forecast, &mut view_data, option);
        apply_filter_option(TabKind::Forecast, &mut view_data, option);
        assert_eq!(view_data.forecast.query().filters.warehouse_id, None);
    }

    #[test]
    fn failed_load_shows_empty_state_and_status() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime {
            fail_transactions: Some("server returned 500".to_owned()),
            ..TestRuntime::default()
        };
        let (tx, _rx) = internal_channel();
        let view_data = loaded_view(&mut state, &mut runtime, &tx);

        assert!(view_data.transactions.rows().is_empty());
        assert_eq!(
            view_data.transactions.last_error(),
            Some("server returned 500")
        );
        let status = state.status_line.clone().unwrap_or_default();
        assert!(status.contains("load transactions"), "status {status}");
        assert!(status.contains("server returned 500"), "status {status}");
    }

    #[test]
    fn bulk_update_requires_a_selection() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(5, 0);
        let (tx, _rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Char('u'))],
        );
        assert_eq!(state.modal, None);
        assert!(
            state
                .status_line
                .as_deref()
                .is_some_and(|status| status.contains("no transactions selected"))
        );
    }

    #[test]
    fn bulk_success_clears_selection_and_closes_after_delay() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(5, 0);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[
                key(KeyCode::Char(' ')),
                key(KeyCode::Char('j')),
                key(KeyCode::Char(' ')),
                key(KeyCode::Char('u')),
                key(KeyCode::Char('j')),
                key(KeyCode::Enter),
            ],
        );
        assert_eq!(runtime.bulk_calls.len(), 1);
        assert_eq!(
            runtime.bulk_calls[0].transaction_ids,
            vec![TransactionId::new(1), TransactionId::new(2)]
        );
        assert_eq!(runtime.bulk_calls[0].status, TransactionStatus::Confirmed);
        assert_eq!(state.modal, Some(ModalKind::BulkStatus));
        assert!(matches!(
            view_data.bulk.as_ref().map(|form| &form.phase),
            Some(BulkPhase::Succeeded { .. })
        ));

        tx.send(InternalEvent::CloseBulkModal {
            token: view_data.bulk_token,
        })
        .expect("send close");
        process_internal_events(&mut state, &mut view_data, &tx, &rx);
        assert_eq!(state.modal, None);
        assert_eq!(view_data.transactions.selection_len(), 0);
    }

    #[test]
    fn bulk_failure_keeps_modal_open_with_error() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime {
            bulk_error: Some("server error (404): Transactions not found: [2]".to_owned()),
            ..runtime_with(5, 0)
        };
        let (tx, rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[
                key(KeyCode::Char(' ')),
                key(KeyCode::Char('u')),
                key(KeyCode::Enter),
            ],
        );
        assert_eq!(state.modal, Some(ModalKind::BulkStatus));
        match view_data.bulk.as_ref().map(|form| &form.phase) {
            Some(BulkPhase::Failed { error }) => assert!(error.contains("not found")),
            other => panic!("expected failure, got {other:?}"),
        }

        tx.send(InternalEvent::CloseBulkModal {
            token: view_data.bulk_token,
        })
        .expect("send close");
        process_internal_events(&mut state, &mut view_data, &tx, &rx);
        assert_eq!(state.modal, Some(ModalKind::BulkStatus));
        assert_eq!(view_data.transactions.selection_len(), 1);
    }

    #[test]
    fn forecast_row_opens_chart_then_order_flow() {
        let mut state = AppState {
            active_tab: TabKind::Forecast,
            ..AppState::default()
        };
        let mut runtime = runtime_with(0, 3);
        let (tx, _rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);
        let forecast_fetches = runtime.forecast_loads.len();

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Enter)],
        );
        assert_eq!(state.modal, Some(ModalKind::ForecastChart));
        let chart = view_data.chart.as_ref().expect("chart state");
        assert_eq!(chart.chart.history.len(), 30);
        assert_eq!(chart.chart.projection.len(), 31);
        assert_eq!(chart.error, None);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Char('o'))],
        );
        assert_eq!(state.modal, Some(ModalKind::CreateOrder));
        let form = view_data.order_form.as_ref().expect("order form");
        assert_eq!(form.input.requested_by, "elena");
        assert_eq!(form.input.sku, "SKU-1");

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Enter)],
        );
        assert_eq!(runtime.created_orders.len(), 1);
        let sent = &runtime.created_orders[0];
        assert_eq!(sent.product_id, ProductId::new(500));
        assert_eq!(sent.forecast_id, Some(ForecastId::new(1)));
        assert_eq!(state.modal, Some(ModalKind::OrderSuccess));
        assert!(runtime.forecast_loads.len() > forecast_fetches);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Esc)],
        );
        assert_eq!(state.modal, None);
        assert_eq!(view_data.created_order, None);
    }

    #[test]
    fn chart_shows_history_error_inline() {
        let mut state = AppState {
            active_tab: TabKind::Forecast,
            ..AppState::default()
        };
        let mut runtime = TestRuntime {
            history_error: Some("server returned 503".to_owned()),
            ..runtime_with(0, 1)
        };
        let (tx, _rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Enter)],
        );
        let chart = view_data.chart.as_ref().expect("chart state");
        assert_eq!(chart.error.as_deref(), Some("server returned 503"));
        assert!(chart.chart.history.is_empty());
        assert_eq!(chart.chart.projection[0].stock, 5.0);
    }

    #[test]
    fn order_form_rejects_blank_requester() {
        let mut state = AppState {
            active_tab: TabKind::Forecast,
            ..AppState::default()
        };
        let mut runtime = runtime_with(0, 1);
        let (tx, _rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);

        let mut keys = vec![key(KeyCode::Char('o')), key(KeyCode::Tab)];
        keys.extend(std::iter::repeat_n(key(KeyCode::Backspace), 5));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &keys);

        assert!(runtime.created_orders.is_empty());
        assert_eq!(state.modal, Some(ModalKind::CreateOrder));
        let error = view_data
            .order_form
            .as_ref()
            .and_then(|form| form.error.clone())
            .unwrap_or_default();
        assert!(error.contains("requester"), "error {error}");
    }

    #[test]
    fn chat_round_trip_sends_transcript_and_shows_reply() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(1, 0);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Char('@'))],
        );
        assert_eq!(state.chat, ChatVisibility::Visible);

        type_text(&mut state, &mut runtime, &mut view_data, &tx, "low stock?");
        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Enter)],
        );
        process_internal_events(&mut state, &mut view_data, &tx, &rx);

        assert_eq!(
            runtime.chat_calls[0],
            vec![ChatTurn {
                role: ChatRole::User,
                content: "low stock?".to_owned(),
            }]
        );
        let bodies = view_data
            .chat
            .transcript
            .iter()
            .map(|line| line.body.as_str())
            .collect::<Vec<_>>();
        assert_eq!(bodies, vec!["low stock?", "2 items need reorder"]);
        assert_eq!(view_data.chat.in_flight, None);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Up)],
        );
        assert_eq!(view_data.chat.input, "low stock?");

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Esc)],
        );
        assert_eq!(state.chat, ChatVisibility::Hidden);
    }

    #[test]
    fn local_chat_commands_are_not_sent_to_the_agent() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(1, 0);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Char('@'))],
        );
        type_text(&mut state, &mut runtime, &mut view_data, &tx, "/health");
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &[key(KeyCode::Enter)]);
        assert!(view_data.chat.transcript[0].body.contains("healthy"));

        type_text(&mut state, &mut runtime, &mut view_data, &tx, "hi");
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &[key(KeyCode::Enter)]);
        process_internal_events(&mut state, &mut view_data, &tx, &rx);
        assert_eq!(runtime.chat_calls[0].len(), 1);

        type_text(&mut state, &mut runtime, &mut view_data, &tx, "/clear");
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &[key(KeyCode::Enter)]);
        assert!(view_data.chat.transcript.is_empty());
    }

    #[test]
    fn stale_chat_reply_is_ignored() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(1, 0);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);
        view_data.chat.in_flight = Some(2);

        tx.send(InternalEvent::ChatReply {
            request_id: 1,
            result: Err("late".to_owned()),
        })
        .expect("send reply");
        process_internal_events(&mut state, &mut view_data, &tx, &rx);
        assert!(view_data.chat.transcript.is_empty());
        assert_eq!(view_data.chat.in_flight, Some(2));
    }

    #[test]
    fn chat_disabled_in_config_stays_closed() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(1, 0);
        let (tx, _rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);
        view_data.options.chat_enabled = false;

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Char('@'))],
        );
        assert_eq!(state.chat, ChatVisibility::Hidden);
        assert_eq!(state.status_line.as_deref(), Some("chat disabled in config"));
    }

    #[test]
    fn stale_status_clear_token_is_ignored() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(1, 0);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);
        let token = view_data.status_token;

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Char(' '))],
        );
        tx.send(InternalEvent::ClearStatus { token }).expect("send clear");
        process_internal_events(&mut state, &mut view_data, &tx, &rx);
        assert_eq!(state.status_line.as_deref(), Some("1 selected"));
    }

    #[test]
    fn tab_switch_loads_the_new_tab() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(1, 4);
        let (tx, _rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);

        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &[key(KeyCode::Tab)]);
        assert_eq!(state.active_tab, TabKind::Forecast);
        assert_eq!(runtime.forecast_loads.len(), 1);
        assert_eq!(
            runtime.forecast_loads[0].sort.key,
            ForecastSortKey::Severity
        );
        assert_eq!(view_data.forecast.rows().len(), 4);
    }

    #[test]
    fn ctrl_q_quits() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(1, 0);
        let (tx, _rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);
        assert!(handle_key_event(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL),
        ));
    }

    #[test]
    fn help_lists_core_keys() {
        let help = help_overlay_text();
        assert!(help.contains("ctrl+q quit"));
        assert!(help.contains("update status of selection"));
    }

    #[test]
    fn every_tab_and_modal_renders() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(30, 3);
        let (tx, _rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).expect("test terminal");

        for tab in TabKind::ALL {
            state.active_tab = tab;
            terminal
                .draw(|frame| render(frame, &state, &view_data))
                .expect("draw tab");
        }

        state.active_tab = TabKind::Transactions;
        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[key(KeyCode::Char('2')), key(KeyCode::Enter)],
        );
        assert_eq!(state.modal, Some(ModalKind::ForecastChart));
        terminal
            .draw(|frame| render(frame, &state, &view_data))
            .expect("draw chart");

        state.modal = Some(ModalKind::Help);
        state.chat = ChatVisibility::Visible;
        terminal
            .draw(|frame| render(frame, &state, &view_data))
            .expect("draw help");
    }

    /// Keeps the text of every frame drawn through it.
    struct RecordingScreen {
        terminal: Terminal<TestBackend>,
        frames: Rc<RefCell<Vec<String>>>,
    }

    impl RecordingScreen {
        fn install(view_data: &mut ViewData) -> Rc<RefCell<Vec<String>>> {
            let frames = Rc::new(RefCell::new(Vec::new()));
            view_data.screen = Some(Box::new(Self {
                terminal: Terminal::new(TestBackend::new(120, 40)).expect("test terminal"),
                frames: Rc::clone(&frames),
            }));
            frames
        }
    }

    impl Screen for RecordingScreen {
        fn show(&mut self, state: &AppState, view_data: &ViewData) -> Result<()> {
            self.terminal
                .draw(|frame| render(frame, state, view_data))?;
            let text = self
                .terminal
                .backend()
                .buffer()
                .content()
                .iter()
                .map(|cell| cell.symbol())
                .collect::<String>();
            self.frames.borrow_mut().push(text);
            Ok(())
        }
    }

    struct BrokenScreen;

    impl Screen for BrokenScreen {
        fn show(&mut self, _state: &AppState, _view_data: &ViewData) -> Result<()> {
            Err(anyhow!("terminal detached"))
        }
    }

    fn scripted_events(
        events: Vec<Result<Option<Event>>>,
    ) -> impl FnMut() -> Result<Option<Event>> {
        let mut events = events.into_iter();
        move || {
            events
                .next()
                .unwrap_or_else(|| Err(anyhow!("event script exhausted")))
        }
    }

    #[test]
    fn loading_title_is_drawn_while_fetch_is_outstanding() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(30, 3);
        let (tx, _rx) = internal_channel();
        let mut view_data = ViewData::new(UiOptions::default());
        let frames = RecordingScreen::install(&mut view_data);

        initial_load(&mut state, &mut runtime, &mut view_data, &tx);
        {
            let frames = frames.borrow();
            assert_eq!(frames.len(), 1);
            assert!(frames[0].contains("loading…"), "loading frame: {}", frames[0]);
            assert!(!frames[0].contains("TXN-"));
        }
        assert!(!view_data.transactions.is_loading());

        paint(&state, &mut view_data).expect("paint settled view");
        let frames = frames.borrow();
        let settled = frames.last().expect("settled frame");
        assert!(!settled.contains("loading…"));
        assert!(settled.contains("TXN-"));
    }

    #[test]
    fn sorting_repaints_with_loading_title_before_refetch() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(30, 3);
        let (tx, _rx) = internal_channel();
        let mut view_data = loaded_view(&mut state, &mut runtime, &tx);
        let frames = RecordingScreen::install(&mut view_data);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &[
                key(KeyCode::Char('l')),
                key(KeyCode::Char('l')),
                key(KeyCode::Char('l')),
                key(KeyCode::Char('s')),
            ],
        );
        let frames = frames.borrow();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("loading…"));
        assert_eq!(runtime.transaction_loads.len(), 2);
    }

    #[test]
    fn loading_paint_failure_does_not_block_the_fetch() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(30, 3);
        let (tx, _rx) = internal_channel();
        let mut view_data = ViewData::new(UiOptions::default());
        view_data.screen = Some(Box::new(BrokenScreen));

        initial_load(&mut state, &mut runtime, &mut view_data, &tx);
        assert_eq!(view_data.transactions.rows().len(), 25);
        assert!(view_data.screen.is_some());
    }

    #[test]
    fn input_failure_ends_event_loop_with_error() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(30, 3);
        let (tx, rx) = internal_channel();
        let mut view_data = ViewData::new(UiOptions::default());
        let frames = RecordingScreen::install(&mut view_data);

        let result = event_loop(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            scripted_events(vec![
                Ok(None),
                Ok(Some(Event::Key(key(KeyCode::Char('2'))))),
                Err(anyhow!("read event: terminal input closed")),
            ]),
        );

        let error = result.expect_err("input failure should end the loop");
        assert!(error.to_string().contains("terminal input closed"));
        assert_eq!(state.active_tab, TabKind::Forecast);
        assert!(!frames.borrow().is_empty());
    }

    #[test]
    fn draw_failure_ends_event_loop_with_error() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(30, 3);
        let (tx, rx) = internal_channel();
        let mut view_data = ViewData::new(UiOptions::default());
        view_data.screen = Some(Box::new(BrokenScreen));

        let result = event_loop(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            scripted_events(Vec::new()),
        );

        let error = result.expect_err("draw failure should end the loop");
        assert!(error.to_string().contains("terminal detached"));
    }

    #[test]
    fn quit_key_ends_event_loop_cleanly() {
        let mut state = AppState::default();
        let mut runtime = runtime_with(30, 3);
        let (tx, rx) = internal_channel();
        let mut view_data = ViewData::new(UiOptions::default());

        let result = event_loop(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            scripted_events(vec![Ok(Some(Event::Key(KeyEvent::new(
                KeyCode::Char('q'),
                KeyModifiers::CONTROL,
            ))))]),
        );

        assert!(result.is_ok());
        assert_eq!(runtime.transaction_loads.len(), 1);
    }

    #[test]
    fn kpi_strip_shows_view_metrics_or_placeholders() {
        let cards = kpi_cards(None);
        assert_eq!(cards.len(), 10);
        assert!(cards.iter().all(|(_, value, _)| value == "-"));

        let kpis = DashboardKpis {
            otpr: Some(OtprMetrics::from_counts((26, 35), (36, 37))),
            turnover: Some(InventoryTurnover {
                overall_inventory_turnover: Some(31.49),
                overall_days_on_hand: Some(12),
                ..InventoryTurnover::default()
            }),
            critical: None,
            ..DashboardKpis::default()
        };
        let cards = kpi_cards(Some(&kpis));
        let value = |label: &str| {
            cards
                .iter()
                .find(|(name, _, _)| *name == label)
                .map(|(_, value, _)| value.clone())
        };
        assert_eq!(value("txns").as_deref(), Some("0"));
        assert_eq!(value("on-time").as_deref(), Some("74.3% ↓"));
        assert_eq!(value("turnover").as_deref(), Some("31.5x 12d"));
        assert_eq!(value("crit/warn").as_deref(), Some("n/a"));

        let mut view_data = ViewData::new(UiOptions::default());
        view_data.kpis = Some(kpis);
        let frames = RecordingScreen::install(&mut view_data);
        paint(&AppState::default(), &mut view_data).expect("paint kpis");
        let frames = frames.borrow();
        assert!(frames[0].contains("74.3%"));
        assert!(frames[0].contains("31.5x"));
    }
}
