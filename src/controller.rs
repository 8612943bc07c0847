//! Single owner of the canvas state and the only place it is mutated.
//!
//! Three sources feed the pixel store: confirmed local actions, realtime
//! patches from session peers and replayed chain events. Every handler runs
//! to completion on the caller's task, so there is no locking here; the
//! merge rules of [`PixelStore`] keep the result independent of which
//! source is seen first.

use ethers::types::{H256, U256};
use image::RgbaImage;
use serde::Serialize;
use serde_json::Value;
use std::{collections::VecDeque, sync::Arc, time::Instant};
use tokio::sync::{
    broadcast::{self, error::TryRecvError},
    mpsc,
};

use crate::{
    canvas::{
        build_display_list, DrawOp, EffectKind, EffectQueue, HitTester, InputEffect, NftMetadata,
        NftPreview, PixelStore, PointerInput, ReferenceOverlay, RenderLoop, Scene, SelectionMachine,
        SelectionState, ViewportState, Weapon, ZoomDirection,
    },
    config::Config,
    constants::{
        BOMB_RADIUS, DEFAULT_SELECTED_COLOR, KEY_PIXEL_UPDATES, KEY_SELECTED_COLOR,
        MAX_PURCHASE_QUANTITY, MIN_PURCHASE_QUANTITY, OVERLAY_DEFAULT_ORIGIN, ROCKET_RADIUS,
    },
    error::{AppError, Result},
    indexer::{ChainEvent, EventParser, LoggedEvent},
    models::{Color, GridCell, PixelPatch, ScreenPoint},
    services::{
        inventory::Inventory,
        onchain::{ChainClient, ContractCall},
        pinning::{upload_complete_nft, PinningService},
        realtime::{SharedKeyValueChannel, SyncMessage, SyncOp},
        transaction::{price_times, FeeSource, TransactionEnvelope},
    },
    utils::{short_hash, RetryPolicy},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// User-facing message queued for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Open weapon shop dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShopOffer {
    pub weapon: Weapon,
    pub unit_price: U256,
    pub quantity: u32,
}

impl ShopOffer {
    pub fn total(&self) -> Result<U256> {
        price_times(self.unit_price, self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponOutcome {
    Launched { tx_hash: H256 },
    /// Inventory was empty; the shop was opened instead.
    ShopOpened(ShopOffer),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedNft {
    /// Read from the `NFTMinted` log of the receipt when present.
    pub token_id: Option<U256>,
    pub token_uri: String,
    pub image_uri: String,
    pub tx_hash: H256,
}

pub struct CanvasController {
    viewport: ViewportState,
    hit_tester: HitTester,
    store: PixelStore,
    selection: SelectionMachine,
    effects: EffectQueue,
    overlay: Option<ReferenceOverlay>,
    inventory: Inventory,
    hover: Option<GridCell>,
    selected_color: Color,
    shop: Option<ShopOffer>,
    nft_preview: Option<NftPreview>,
    notices: VecDeque<Notice>,
    render_loop: RenderLoop,
    parser: EventParser,
    envelope: TransactionEnvelope,
    pinning: Arc<dyn PinningService>,
    realtime: Arc<dyn SharedKeyValueChannel>,
    retry: RetryPolicy,
}

impl CanvasController {
    pub fn new(
        config: &Config,
        chain: Arc<dyn ChainClient>,
        pinning: Arc<dyn PinningService>,
        realtime: Arc<dyn SharedKeyValueChannel>,
    ) -> Result<Self> {
        let viewport = ViewportState::new(config.canvas_width, config.canvas_height);
        Ok(Self {
            render_loop: RenderLoop::new(&viewport),
            viewport,
            hit_tester: HitTester::new(ScreenPoint::default(), config.hit_rounding),
            store: PixelStore::new(),
            selection: SelectionMachine::new(),
            effects: EffectQueue::new(),
            overlay: None,
            inventory: Inventory::new(),
            hover: None,
            selected_color: Color::parse(DEFAULT_SELECTED_COLOR)?,
            shop: None,
            nft_preview: None,
            notices: VecDeque::new(),
            parser: EventParser::new(),
            envelope: TransactionEnvelope::new(chain, config),
            pinning,
            realtime,
            retry: RetryPolicy::default(),
        })
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn store(&self) -> &PixelStore {
        &self.store
    }

    pub fn selection(&self) -> &SelectionState {
        self.selection.state()
    }

    pub fn is_interaction_disabled(&self) -> bool {
        self.selection.is_interaction_disabled()
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn effects(&self) -> &EffectQueue {
        &self.effects
    }

    pub fn overlay(&self) -> Option<&ReferenceOverlay> {
        self.overlay.as_ref()
    }

    pub fn hover(&self) -> Option<GridCell> {
        self.hover
    }

    pub fn selected_color(&self) -> &Color {
        &self.selected_color
    }

    pub fn shop(&self) -> Option<&ShopOffer> {
        self.shop.as_ref()
    }

    pub fn nft_preview(&self) -> Option<&NftPreview> {
        self.nft_preview.as_ref()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push_back(Notice {
            level,
            message: message.into(),
        });
    }

    // Surface the error to the user and hand it back to the caller.
    fn fail<T>(&mut self, action: &str, err: AppError) -> Result<T> {
        let message = match &err {
            AppError::TransactionRejected(_) => format!("{action} rejected in wallet"),
            e if e.is_transaction_failure() => format!("{action} failed: {e}"),
            e if e.is_user_error() => e.to_string(),
            e => format!("{action} failed: {e}"),
        };
        if err.is_user_error() {
            tracing::debug!("{} refused: {}", action, err);
        } else {
            tracing::warn!("{} failed: {}", action, err);
        }
        self.notify(NoticeLevel::Error, message);
        Err(err)
    }

    // Merge confirmed writes into the session so late joiners see them.
    // The local store is already updated; a failed publish is only logged.
    async fn share_patch(&self, patch: &PixelPatch, what: &str) {
        if patch.is_empty() {
            return;
        }
        if let Err(err) = self
            .realtime
            .publish(KEY_PIXEL_UPDATES, SyncOp::Merge, patch.to_value())
            .await
        {
            tracing::warn!("Failed to broadcast {} ({} cells): {}", what, patch.len(), err);
        }
    }

    fn require_wallet(&self) -> Result<ethers::types::Address> {
        self.envelope.chain().account().ok_or(AppError::WalletNotConnected)
    }

    fn ensure_interactive(&self, action: &str) -> Result<()> {
        match self.selection.state() {
            SelectionState::AreaTargeting { .. } => Err(AppError::ActionPending(action.to_string())),
            SelectionState::NftSelecting { .. } => Err(AppError::InteractionDisabled),
            _ => Ok(()),
        }
    }

    // ---- pointer, wheel and viewport input ----

    /// Client position of the canvas' top-left corner.
    pub fn set_canvas_origin(&mut self, origin: ScreenPoint) {
        self.hit_tester.origin = origin;
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport = self.viewport.resize(width, height);
    }

    pub fn pointer_down(&mut self, input: &PointerInput, now: Instant) -> InputEffect {
        let Some(hit) = self.hit_tester.resolve(input, &self.viewport) else {
            return InputEffect::None;
        };
        let world = self.viewport.screen_to_world_point(hit.canvas);
        let over_overlay = !self.selection.is_interaction_disabled()
            && self
                .overlay
                .as_ref()
                .is_some_and(|o| !o.is_locked() && o.contains(world));
        let effect = self.selection.pointer_down(&hit, now, over_overlay);
        self.apply_input(effect)
    }

    pub fn pointer_move(&mut self, input: &PointerInput) -> InputEffect {
        let Some(hit) = self.hit_tester.resolve(input, &self.viewport) else {
            return InputEffect::None;
        };
        self.hover = hit.cell;
        let effect = self.selection.pointer_move(&hit);
        self.apply_input(effect)
    }

    /// `input` is `None` when the release happened outside the canvas.
    pub fn pointer_up(&mut self, input: Option<&PointerInput>, now: Instant) -> InputEffect {
        let hit = input.and_then(|i| self.hit_tester.resolve(i, &self.viewport));
        let effect = self.selection.pointer_up(hit.as_ref(), now);
        self.apply_input(effect)
    }

    pub fn pointer_leave(&mut self) {
        self.hover = None;
    }

    fn apply_input(&mut self, effect: InputEffect) -> InputEffect {
        match effect {
            InputEffect::Pan { dx, dy } => self.viewport = self.viewport.pan_by(dx, dy),
            InputEffect::DragOverlay { dx, dy } => {
                let scale = self.viewport.scale;
                if let Some(overlay) = self.overlay.as_mut() {
                    overlay.drag_by(dx / scale, dy / scale);
                }
            }
            InputEffect::Selected(cell) => tracing::debug!("Pixel selected: {}", cell),
            InputEffect::NftConfirmed(rect) => match NftPreview::render(&self.store, &rect) {
                Ok(preview) => self.nft_preview = Some(preview),
                Err(err) => {
                    tracing::warn!("NFT preview failed: {}", err);
                    self.notify(NoticeLevel::Error, format!("NFT preview failed: {err}"));
                }
            },
            InputEffect::NftProgress(_) | InputEffect::None => {}
        }
        effect
    }

    /// One wheel tick at a client point. Ignored while interaction is disabled.
    pub fn wheel(&mut self, client: ScreenPoint, delta_y: f64) -> bool {
        if self.selection.is_interaction_disabled() {
            return false;
        }
        let origin = self.hit_tester.origin;
        let anchor = ScreenPoint::new(client.x - origin.x, client.y - origin.y);
        self.viewport = self
            .viewport
            .zoom_at(anchor, ZoomDirection::from_wheel_delta(delta_y));
        true
    }

    pub fn zoom_in(&mut self) -> bool {
        self.zoom_button(1)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.zoom_button(-1)
    }

    fn zoom_button(&mut self, steps: i32) -> bool {
        if self.selection.is_interaction_disabled() {
            return false;
        }
        self.viewport = self.viewport.zoom_by(steps);
        true
    }

    pub fn deselect(&mut self) {
        self.selection.deselect();
    }

    // ---- realtime session ----

    /// Late-join snapshot: merge the session's current pixels and color.
    pub async fn join(&mut self) -> Result<usize> {
        let mut changed = 0;
        if let Some(value) = self.realtime.read(KEY_PIXEL_UPDATES).await? {
            changed = self.store.apply_remote(&PixelPatch::from_value(&value));
        }
        if let Some(Value::String(raw)) = self.realtime.read(KEY_SELECTED_COLOR).await? {
            match Color::parse(&raw) {
                Ok(color) => self.selected_color = color,
                Err(err) => tracing::warn!("Ignoring shared selected color: {}", err),
            }
        }
        tracing::info!(
            "Joined session as {} ({} cells merged)",
            self.realtime.client_id(),
            changed
        );
        Ok(changed)
    }

    /// Apply one message from a session peer; own echoes are skipped.
    pub fn apply_remote(&mut self, message: &SyncMessage) -> bool {
        if message.origin == self.realtime.client_id() {
            return false;
        }
        match message.key.as_str() {
            KEY_PIXEL_UPDATES => self.store.apply_remote(&PixelPatch::from_value(&message.value)) > 0,
            KEY_SELECTED_COLOR => match message.value.as_str().map(Color::parse) {
                Some(Ok(color)) => {
                    let changed = color != self.selected_color;
                    self.selected_color = color;
                    changed
                }
                _ => {
                    tracing::warn!("Ignoring malformed selected color {}", message.value);
                    false
                }
            },
            other => {
                tracing::debug!("Ignoring realtime key {}", other);
                false
            }
        }
    }

    /// Drain pending session messages. A lagging receiver re-reads the snapshot.
    pub async fn pump_realtime(&mut self, rx: &mut broadcast::Receiver<SyncMessage>) -> Result<usize> {
        let mut applied = 0;
        loop {
            match rx.try_recv() {
                Ok(message) => {
                    if self.apply_remote(&message) {
                        applied += 1;
                    }
                }
                Err(TryRecvError::Empty) => return Ok(applied),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Realtime receiver lagged by {} messages; resyncing", skipped);
                    applied += self.join().await?;
                }
                Err(TryRecvError::Closed) => {
                    return Err(AppError::Realtime("session channel closed".to_string()))
                }
            }
        }
    }

    pub async fn set_selected_color(&mut self, raw: &str) -> Result<()> {
        let color = match Color::parse(raw) {
            Ok(color) => color,
            Err(err) => return self.fail("Color", err),
        };
        self.selected_color = color.clone();
        self.realtime
            .publish(KEY_SELECTED_COLOR, SyncOp::Replace, Value::String(color.to_string()))
            .await
    }

    // ---- chain event replay ----

    /// Replay a contract event. Clears are applied and shared for every
    /// account; the blast visual only for other accounts, whose action was
    /// not seen locally.
    pub async fn apply_chain_event(&mut self, logged: &LoggedEvent, now: Instant) {
        let own = self.envelope.chain().account();
        match &logged.event {
            ChainEvent::AreaBombed { user, center, radius } | ChainEvent::RocketFired { user, center, radius } => {
                let patch = self.store.apply_area_clear(*center, *radius);
                self.share_patch(&patch, "area clear").await;
                if Some(*user) != own {
                    let kind = match logged.event {
                        ChainEvent::RocketFired { .. } => EffectKind::Rocket,
                        _ => EffectKind::Boom,
                    };
                    self.effects.spawn(kind, *center, *radius, now);
                }
            }
            ChainEvent::NftMinted { to, token_id, token_uri } => {
                tracing::info!("NFT #{} minted to {:#x}: {}", token_id, to, token_uri);
            }
        }
    }

    /// Drain decoded events forwarded by the event watcher.
    pub async fn drain_chain_events(&mut self, rx: &mut mpsc::Receiver<LoggedEvent>, now: Instant) -> usize {
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            self.apply_chain_event(&event, now).await;
            applied += 1;
        }
        applied
    }

    // ---- transactions ----

    pub async fn paint(&mut self) -> Result<H256> {
        let cell = match self.selection.state() {
            SelectionState::PixelSelected(cell) => *cell,
            SelectionState::AreaTargeting { .. } | SelectionState::NftSelecting { .. } => {
                return self.fail("Paint", AppError::InteractionDisabled)
            }
            _ => return self.fail("Paint", AppError::NoPixelSelected),
        };
        if let Err(err) = self.require_wallet() {
            return self.fail("Paint", err);
        }
        let color = self.selected_color.clone();
        let call = ContractCall::PlacePixel {
            x: cell.x as u32,
            y: cell.y as u32,
            color: color.to_string(),
        };

        let result = self.envelope.execute(call, FeeSource::Free).await;
        let tx = match result {
            Ok(tx) => tx,
            Err(err) => return self.fail("Paint", err),
        };
        let patch = self.store.apply_local(cell, color);
        self.share_patch(&patch, "pixel").await;
        self.notify(
            NoticeLevel::Success,
            format!("Pixel placed successfully! {}", tx.short_hash()),
        );
        Ok(tx.tx_hash())
    }

    /// Bomb or rocket the selected cell, or open the shop when out of stock.
    pub async fn use_weapon(&mut self, weapon: Weapon) -> Result<WeaponOutcome> {
        let action = weapon.label();
        if let Err(err) = self.ensure_interactive(action) {
            return self.fail(action, err);
        }
        let account = match self.require_wallet() {
            Ok(account) => account,
            Err(err) => return self.fail(action, err),
        };

        let chain = self.envelope.chain().clone();
        let on_chain = match weapon {
            Weapon::Bomb => chain.bombs(account).await,
            Weapon::Rocket => chain.rockets(account).await,
        };
        match on_chain {
            Ok(count) => self.inventory.reconcile(weapon, count),
            Err(err) => tracing::warn!("{} count re-read failed, using local count: {}", action, err),
        }
        if self.inventory.count(weapon) == 0 {
            return self.open_shop(weapon).await.map(WeaponOutcome::ShopOpened);
        }

        let radius = match weapon {
            Weapon::Bomb => BOMB_RADIUS,
            Weapon::Rocket => ROCKET_RADIUS,
        };
        let (pending_id, cell) = match self.selection.begin_targeting(weapon, radius) {
            Ok(target) => target,
            Err(err) => return self.fail(action, err),
        };
        let (x, y) = (cell.x as u32, cell.y as u32);
        let call = match weapon {
            Weapon::Bomb => ContractCall::BombArea { x, y, radius },
            Weapon::Rocket => ContractCall::FireRocket { x, y, radius },
        };

        let result = self.envelope.execute(call, FeeSource::Free).await;
        let tx = match result {
            Ok(tx) => tx,
            Err(err) => {
                self.selection.cancel_targeting(pending_id);
                return self.fail(action, err);
            }
        };
        self.selection.resolve_targeting(pending_id);
        let patch = self.store.apply_area_clear(cell, radius);
        self.share_patch(&patch, "area clear").await;
        let kind = match weapon {
            Weapon::Bomb => EffectKind::Boom,
            Weapon::Rocket => EffectKind::Rocket,
        };
        self.effects.spawn(kind, cell, radius, Instant::now());
        self.inventory.debit(weapon);
        let headline = match weapon {
            Weapon::Bomb => "BOOM!",
            Weapon::Rocket => "Rocket hit!",
        };
        self.notify(NoticeLevel::Success, format!("{} {}", headline, tx.short_hash()));
        Ok(WeaponOutcome::Launched { tx_hash: tx.tx_hash() })
    }

    pub async fn open_shop(&mut self, weapon: Weapon) -> Result<ShopOffer> {
        let chain = self.envelope.chain().clone();
        let price = match weapon {
            Weapon::Bomb => chain.bomb_price().await,
            Weapon::Rocket => chain.rocket_price().await,
        };
        let unit_price = match price {
            Ok(price) => price,
            Err(err) => return self.fail("Shop", err),
        };
        let offer = ShopOffer {
            weapon,
            unit_price,
            quantity: MIN_PURCHASE_QUANTITY,
        };
        self.shop = Some(offer);
        Ok(offer)
    }

    pub fn close_shop(&mut self) {
        self.shop = None;
    }

    pub async fn buy(&mut self, weapon: Weapon, quantity: u32) -> Result<H256> {
        if !(MIN_PURCHASE_QUANTITY..=MAX_PURCHASE_QUANTITY).contains(&quantity) {
            let err = AppError::InvalidInput(format!(
                "quantity must be between {} and {}, got {}",
                MIN_PURCHASE_QUANTITY, MAX_PURCHASE_QUANTITY, quantity
            ));
            return self.fail("Purchase", err);
        }
        if let Err(err) = self.require_wallet() {
            return self.fail("Purchase", err);
        }
        let (call, fee) = match weapon {
            Weapon::Bomb => (ContractCall::BuyBomb, FeeSource::BombPrice { quantity }),
            Weapon::Rocket => (ContractCall::BuyRocket, FeeSource::RocketPrice { quantity }),
        };

        let result = self.envelope.execute(call, fee).await;
        let tx = match result {
            Ok(tx) => tx,
            Err(err) => return self.fail("Purchase", err),
        };
        self.inventory.credit(weapon, quantity);
        self.shop = None;
        self.notify(
            NoticeLevel::Success,
            format!("{} x{} purchased! {}", weapon.label(), quantity, tx.short_hash()),
        );
        Ok(tx.tx_hash())
    }

    /// Authoritative re-read of both counters.
    pub async fn refresh_inventory(&mut self) -> Result<()> {
        let account = self.require_wallet()?;
        let chain = self.envelope.chain().clone();
        let bombs = chain.bombs(account).await?;
        let rockets = chain.rockets(account).await?;
        self.inventory.reconcile(Weapon::Bomb, bombs);
        self.inventory.reconcile(Weapon::Rocket, rockets);
        Ok(())
    }

    pub async fn claim_daily(&mut self) -> Result<H256> {
        let account = match self.require_wallet() {
            Ok(account) => account,
            Err(err) => return self.fail("Daily claim", err),
        };
        let chain = self.envelope.chain().clone();
        match chain.can_claim_today(account).await {
            Ok(true) => {}
            Ok(false) => {
                let err = AppError::InvalidInput("daily reward already claimed today".to_string());
                return self.fail("Daily claim", err);
            }
            Err(err) => return self.fail("Daily claim", err),
        }

        let result = self
            .envelope
            .execute(ContractCall::ClaimDaily, FeeSource::DailyClaimFee)
            .await;
        let tx = match result {
            Ok(tx) => tx,
            Err(err) => return self.fail("Daily claim", err),
        };
        self.notify(NoticeLevel::Success, format!("Daily reward claimed! {}", tx.short_hash()));
        if let Err(err) = self.refresh_inventory().await {
            tracing::warn!("Inventory refresh after claim failed: {}", err);
        }
        Ok(tx.tx_hash())
    }

    // ---- NFT capture and mint ----

    pub fn start_nft_capture(&mut self) -> Result<()> {
        if let Err(err) = self.selection.start_nft_capture() {
            return self.fail("NFT capture", err);
        }
        self.nft_preview = None;
        self.notify(NoticeLevel::Success, "NFT mode: drag across the area to capture");
        Ok(())
    }

    pub fn clear_nft(&mut self) -> bool {
        self.nft_preview = None;
        self.selection.clear_nft()
    }

    /// Upload preview and metadata, then mint. On failure the confirmed
    /// area stays selected so the mint can be retried.
    pub async fn mint_nft(&mut self) -> Result<MintedNft> {
        let Some(rect) = self.selection.state().nft_confirmed() else {
            let err = AppError::InvalidInput("select an NFT area first".to_string());
            return self.fail("Mint", err);
        };
        if let Err(err) = self.require_wallet() {
            return self.fail("Mint", err);
        }
        let preview = match self.nft_preview.as_ref().filter(|p| p.rect == rect) {
            Some(preview) => preview.clone(),
            None => match NftPreview::render(&self.store, &rect) {
                Ok(preview) => preview,
                Err(err) => return self.fail("Mint", err),
            },
        };
        self.nft_preview = Some(preview.clone());

        let uploaded = upload_complete_nft(
            self.pinning.as_ref(),
            &preview.data_url(),
            NftMetadata::for_area(&rect),
            self.retry,
        )
        .await;
        let upload = match uploaded {
            Ok(upload) => upload,
            Err(err) => return self.fail("NFT upload", err),
        };

        let call = ContractCall::MintNft {
            token_uri: upload.metadata_uri.clone(),
        };
        let result = self.envelope.execute(call, FeeSource::Free).await;
        let tx = match result {
            Ok(tx) => tx,
            Err(err) => return self.fail("Mint", err),
        };
        let token_id = tx
            .receipt
            .logs
            .iter()
            .filter_map(|log| self.parser.parse_event(log))
            .find_map(|event| match event {
                ChainEvent::NftMinted { token_id, .. } => Some(token_id),
                _ => None,
            });

        self.selection.mint_succeeded();
        self.nft_preview = None;
        let label = token_id.map(|id| format!(" #{id}")).unwrap_or_default();
        self.notify(
            NoticeLevel::Success,
            format!("NFT{} minted! {}", label, short_hash(&tx.hash_hex())),
        );
        Ok(MintedNft {
            token_id,
            token_uri: upload.metadata_uri,
            image_uri: upload.image_uri,
            tx_hash: tx.tx_hash(),
        })
    }

    // ---- reference overlay ----

    /// Anchored at the selected cell, else the hovered cell, else the default spot.
    pub fn load_overlay(&mut self, bytes: &[u8]) -> Result<()> {
        let origin = self
            .selection
            .state()
            .selected_cell()
            .or(self.hover)
            .map(|cell| ScreenPoint::new(cell.x as f64, cell.y as f64))
            .unwrap_or(ScreenPoint::new(OVERLAY_DEFAULT_ORIGIN.0, OVERLAY_DEFAULT_ORIGIN.1));
        match ReferenceOverlay::from_bytes(bytes, origin) {
            Ok(overlay) => {
                self.overlay = Some(overlay);
                Ok(())
            }
            Err(err) => self.fail("Overlay", err),
        }
    }

    pub fn set_overlay_opacity(&mut self, opacity: f32) -> bool {
        self.overlay.as_mut().map(|o| o.set_opacity(opacity)).is_some()
    }

    pub fn set_overlay_locked(&mut self, locked: bool) -> bool {
        self.overlay.as_mut().map(|o| o.set_locked(locked)).is_some()
    }

    pub fn remove_overlay(&mut self) -> bool {
        self.overlay.take().is_some()
    }

    // ---- rendering ----

    pub fn display_list(&self, now: Instant) -> Vec<DrawOp> {
        build_display_list(&Scene {
            viewport: &self.viewport,
            store: &self.store,
            selection: self.selection.state(),
            overlay: self.overlay.as_ref(),
            effects: &self.effects,
            hover: self.hover,
            selected_color: &self.selected_color,
            now,
        })
    }

    /// Prune expired effects and redraw if anything changed.
    pub fn render(&mut self, now: Instant) -> Option<&RgbaImage> {
        self.effects.prune(now);
        let scene = Scene {
            viewport: &self.viewport,
            store: &self.store,
            selection: self.selection.state(),
            overlay: self.overlay.as_ref(),
            effects: &self.effects,
            hover: self.hover,
            selected_color: &self.selected_color,
            now,
        };
        self.render_loop.render_if_dirty(&scene)
    }
}
