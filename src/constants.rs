/// Application constants

// Canvas geometry
pub const CANVAS_SIZE: i32 = 500;
pub const INITIAL_SCALE: f64 = 16.0;
pub const MIN_SCALE: f64 = 3.0;
pub const MAX_SCALE: f64 = 40.0;
pub const WHEEL_ZOOM_STEP: f64 = 1.0;
pub const BUTTON_ZOOM_STEP: f64 = 2.0;
pub const INITIAL_OFFSET: (f64, f64) = (200.0, 200.0);
pub const DEFAULT_CANVAS_WIDTH: f64 = 375.0; // mobile
pub const DEFAULT_CANVAS_HEIGHT: f64 = 600.0;

// Pixel colors
pub const BACKGROUND_COLOR: &str = "#111";
pub const DEFAULT_SELECTED_COLOR: &str = "#FFD635";

// Gestures
pub const TAP_THRESHOLD_MS: u64 = 300;

// Weapons
pub const BOMB_RADIUS: u32 = 3;
pub const ROCKET_RADIUS: u32 = 3;
pub const MIN_PURCHASE_QUANTITY: u32 = 1;
pub const MAX_PURCHASE_QUANTITY: u32 = 99;

// Effect visuals
pub const BOOM_EFFECT_TTL_MS: u64 = 800;
pub const ROCKET_EFFECT_TTL_MS: u64 = 2_000;

// NFT capture
pub const NFT_PIXEL_SIZE: u32 = 10;
pub const NFT_NAME: &str = "Pixel Art";

// Reference overlay
pub const OVERLAY_CELLS: u32 = 25;
pub const OVERLAY_DEFAULT_OPACITY: f32 = 0.4;
pub const OVERLAY_DEFAULT_ORIGIN: (f64, f64) = (5.0, 5.0);

// Render thresholds (scale, screen px per cell)
pub const GRID_LINES_MIN_SCALE: f64 = 8.0;
pub const PIXEL_HIGHLIGHT_MIN_SCALE: f64 = 4.0;
pub const HOVER_PREVIEW_MIN_SCALE: f64 = 2.0;
pub const HOVER_PREVIEW_ALPHA: f32 = 0.6;

// Transactions
pub const TX_CONFIRM_TIMEOUT_MS: u64 = 60_000;
pub const RECEIPT_POLL_INTERVAL_MS: u64 = 1_500;

// Collaborator retry helper
pub const RETRY_MAX_ATTEMPTS: u32 = 5;
pub const RETRY_BASE_DELAY_MS: u64 = 3_000;

// Event watcher
pub const EVENT_POLL_INTERVAL_SECS: u64 = 5;
pub const EVENT_BACKFILL_BLOCKS: u64 = 128;
pub const EVENT_MAX_BLOCKS_PER_TICK: u64 = 500;
pub const EVENT_TRANSIENT_BACKOFF_MAX_SECS: u64 = 300;

// Realtime keys
pub const KEY_PIXEL_UPDATES: &str = "pixelUpdates";
pub const KEY_SELECTED_COLOR: &str = "selectedColor";
pub const DEFAULT_SESSION_ID: &str = "pixel-war";
pub const SESSION_CHANNEL_CAPACITY: usize = 1024;
pub const MAX_SESSIONS: usize = 1024;

// WebSocket configuration
pub const WS_HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const WS_CLIENT_TIMEOUT_SECS: u64 = 60;

pub const COLORS: [&str; 80] = [
    "#E46E6E", "#FFD635", "#7EED56", "#00CCC0", "#51E9F4", "#94B3FF", "#E4ABFF", "#FF99AA",
    "#FFB470", "#FFFFFF", "#BE0039", "#FF9600", "#00CC78", "#009EAA", "#3690EA", "#6A5CFF",
    "#B44AC0", "#FF3881", "#9C6926", "#898D90", "#6D001A", "#BF4300", "#00A368", "#00756F",
    "#2450A4", "#493AC1", "#811E9F", "#A00357", "#6D482F", "#000000", "#FF6B6B", "#4ECDC4",
    "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E9",
    "#F8C471", "#82E0AA", "#F1948A", "#85929E", "#D2B4DE", "#AED6F1", "#A9DFBF", "#F9E79F",
    "#D7BDE2", "#A3E4D7", "#FAD7A0", "#ABEBC6", "#F5B7B1", "#BFC9CA", "#E8DAEF", "#D6EAF8",
    "#D1F2EB", "#FCF3CF", "#FADBD8", "#EAEDED", "#FF7675", "#74B9FF", "#FD79A8", "#FDCB6E",
    "#6C5CE7", "#00B894", "#E17055", "#A29BFE", "#FD83A8", "#55A3FF", "#26D0CE", "#FEA47F",
    "#B8860B", "#32CD32", "#FF1493", "#00BFFF", "#FF4500", "#9370DB", "#20B2AA", "#DC143C",
];

// API version
pub const API_VERSION: &str = "v1";
