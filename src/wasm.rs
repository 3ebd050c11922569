//! WebAssembly bindings for the Life widget.
//!
//! Wraps [`Life`] for a page: the host forwards `requestAnimationFrame`
//! timestamps to `tick`, pointer events to the `pointer*` methods and UI
//! commands to the rest. When WebGPU is unavailable the widget reports it
//! once and every method becomes a no-op.
//!
//! Readbacks resolve on a later browser task. The widget lives behind an
//! `Rc<RefCell<_>>` so pending readbacks never hold a borrow of the JS object,
//! and `tick` keeps rendering while a pointer press is being sampled.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use js_sys::Promise;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::{Document, HtmlCanvasElement};

use crate::compute::gpu::{GpuContext, GpuError, Screen};
use crate::compute::{TargetRect, Viewport};
use crate::life::{Life, LifeError};
use crate::schema::{LifeConfig, Seed};

/// Initialize WASM module with panic hook and logging.
#[wasm_bindgen(start)]
pub fn init() {
    // Set panic hook for better error messages in browser
    console_error_panic_hook::set_once();

    // Initialize WASM logger
    wasm_logger::init(wasm_logger::Config::default());
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn document() -> Result<Document, JsValue> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document available"))
}

/// Canvas size in device pixels, and the target region relative to the canvas.
fn measure(canvas: &HtmlCanvasElement, target_id: &str) -> Result<(Viewport, TargetRect), JsValue> {
    let dpr = web_sys::window()
        .map(|w| w.device_pixel_ratio())
        .unwrap_or(1.0) as f32;
    let canvas_rect = canvas.get_bounding_client_rect();
    let viewport = Viewport::new(
        (canvas_rect.width() as f32 * dpr).round() as u32,
        (canvas_rect.height() as f32 * dpr).round() as u32,
    );
    canvas.set_width(viewport.width.max(1));
    canvas.set_height(viewport.height.max(1));

    let target = document()?
        .get_element_by_id(target_id)
        .ok_or_else(|| JsValue::from_str(&format!("no element with id '{target_id}'")))?
        .get_bounding_client_rect();
    let rect = TargetRect::new(
        ((target.left() - canvas_rect.left()) as f32) * dpr,
        ((target.top() - canvas_rect.top()) as f32) * dpr,
        target.width() as f32 * dpr,
        target.height() as f32 * dpr,
    );
    Ok((viewport, rect))
}

/// Client coordinates to device pixels relative to the canvas.
fn canvas_point(canvas: &HtmlCanvasElement, client_x: f32, client_y: f32) -> (f32, f32) {
    let dpr = web_sys::window()
        .map(|w| w.device_pixel_ratio())
        .unwrap_or(1.0) as f32;
    let rect = canvas.get_bounding_client_rect();
    (
        (client_x - rect.left() as f32) * dpr,
        (client_y - rect.top() as f32) * dpr,
    )
}

async fn build_life(
    canvas: &HtmlCanvasElement,
    config: LifeConfig,
    seed: &Seed,
    viewport: Viewport,
    target: TargetRect,
) -> Result<Life, LifeError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let surface = instance
        .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
        .map_err(GpuError::from)?;
    let ctx = GpuContext::new(&instance, Some(&surface)).await?;
    let screen = Screen::surface(&ctx, surface, viewport);
    Life::new(&ctx, screen, config, seed, viewport, target)
}

/// WebAssembly wrapper for the Life widget.
#[wasm_bindgen]
pub struct WasmLife {
    life: Option<Rc<RefCell<Life>>>,
    /// Bumped on every release; a press sampled under an older value is dropped.
    press: Rc<Cell<u64>>,
    canvas: HtmlCanvasElement,
    target_element_id: String,
}

impl WasmLife {
    fn with_life<R>(&self, inactive: R, f: impl FnOnce(&mut Life) -> R) -> R {
        match &self.life {
            Some(life) => f(&mut life.borrow_mut()),
            None => inactive,
        }
    }

    fn release(&self, f: impl FnOnce(&mut Life)) {
        self.press.set(self.press.get().wrapping_add(1));
        self.with_life((), f);
    }
}

#[wasm_bindgen]
impl WasmLife {
    /// Create the widget from a JSON `LifeConfig` and optional JSON `Seed`.
    ///
    /// This is async because GPU initialization requires async adapter/device requests.
    /// Rejects on invalid configuration or shader failures; resolves to an
    /// inert widget when WebGPU is unavailable.
    #[wasm_bindgen(constructor)]
    pub async fn new(config_json: &str, seed_json: Option<String>) -> Result<WasmLife, JsValue> {
        let config = LifeConfig::from_json(config_json).map_err(js_error)?;
        let seed: Seed = match seed_json {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| JsValue::from_str(&format!("Invalid seed JSON: {e}")))?,
            None => Seed::default(),
        };

        let canvas = document()?
            .get_element_by_id(&config.canvas_element_id)
            .ok_or_else(|| {
                JsValue::from_str(&format!("no element with id '{}'", config.canvas_element_id))
            })?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| JsValue::from_str("mount element is not a canvas"))?;
        let (viewport, target) = measure(&canvas, &config.target_element_id)?;
        let target_element_id = config.target_element_id.clone();

        let life = match build_life(&canvas, config, &seed, viewport, target).await {
            Ok(life) => Some(Rc::new(RefCell::new(life))),
            Err(LifeError::Gpu(GpuError::NoAdapter | GpuError::CreateSurface(_))) => {
                log::warn!("WebGPU unavailable; life widget disabled");
                None
            }
            Err(e) => return Err(js_error(e)),
        };

        Ok(WasmLife {
            life,
            press: Rc::new(Cell::new(0)),
            canvas,
            target_element_id,
        })
    }

    /// Whether the GPU pipeline is running.
    #[wasm_bindgen(js_name = isActive)]
    pub fn is_active(&self) -> bool {
        self.life.is_some()
    }

    /// Frame callback with a `requestAnimationFrame` timestamp; returns timesteps consumed.
    #[wasm_bindgen]
    pub fn tick(&self, now_ms: f64) -> u32 {
        self.with_life(0, |life| life.tick(now_ms))
    }

    #[wasm_bindgen]
    pub fn start(&self) {
        self.with_life((), Life::start);
    }

    #[wasm_bindgen]
    pub fn stop(&self) {
        self.with_life((), Life::stop);
    }

    #[wasm_bindgen]
    pub fn toggle(&self) {
        self.with_life((), Life::toggle);
    }

    #[wasm_bindgen(js_name = isPlaying)]
    pub fn is_playing(&self) -> bool {
        self.with_life(false, |life| life.is_playing())
    }

    #[wasm_bindgen]
    pub fn step(&self) {
        self.with_life((), Life::step);
    }

    #[wasm_bindgen]
    pub fn randomize(&self) -> Result<(), JsValue> {
        self.with_life(Ok(()), |life| life.randomize().map_err(js_error))
    }

    #[wasm_bindgen(js_name = setCellsize)]
    pub fn set_cellsize(&self, cellsize: f32) {
        self.with_life((), |life| life.set_cellsize(cellsize));
    }

    #[wasm_bindgen(js_name = setDrawing)]
    pub fn set_drawing(&self, drawing: bool) {
        self.with_life((), |life| life.set_drawing(drawing));
    }

    #[wasm_bindgen(js_name = setFullscreen)]
    pub fn set_fullscreen(&self, fullscreen: bool) {
        self.with_life((), |life| life.set_fullscreen(fullscreen));
    }

    /// Change speed by `n` factors of 4 (positive is faster); returns the new divisor.
    #[wasm_bindgen(js_name = stepSpeed)]
    pub fn step_speed(&self, n: Option<i32>) -> u32 {
        self.with_life(1, |life| life.step_speed(n))
    }

    /// Re-measure the canvas and target element, then render.
    #[wasm_bindgen]
    pub fn resize(&self) -> Result<(), JsValue> {
        if self.life.is_none() {
            return Ok(());
        }
        let (viewport, target) = measure(&self.canvas, &self.target_element_id)?;
        self.with_life(Ok(()), |life| life.resize(viewport, target).map_err(js_error))
    }

    /// Begin drawing once the cell under the pointer has been sampled.
    ///
    /// Returns a promise that resolves when the press is applied. A release
    /// arriving before then cancels the press.
    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&self, client_x: f32, client_y: f32) -> Promise {
        let Some(life) = &self.life else {
            return Promise::resolve(&JsValue::UNDEFINED);
        };
        let (x, y) = canvas_point(&self.canvas, client_x, client_y);
        let sample = life.borrow().pointer_down_async(x, y);
        let life = Rc::clone(life);
        let press = Rc::clone(&self.press);
        let issued = press.get();

        future_to_promise(async move {
            let sampled = sample.await.map_err(js_error)?;
            if press.get() != issued {
                log::debug!("pointer released before its press was sampled");
                return Ok(JsValue::UNDEFINED);
            }
            life.borrow_mut().begin_press(sampled);
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&self, client_x: f32, client_y: f32) {
        let (x, y) = canvas_point(&self.canvas, client_x, client_y);
        self.with_life((), |life| life.pointer_move(x, y));
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&self) {
        self.release(Life::pointer_up);
    }

    #[wasm_bindgen(js_name = pointerLeave)]
    pub fn pointer_leave(&self) {
        self.release(Life::pointer_leave);
    }

    #[wasm_bindgen(js_name = touchEnd)]
    pub fn touch_end(&self) {
        self.release(Life::touch_end);
    }

    #[wasm_bindgen]
    pub fn generation(&self) -> u64 {
        self.with_life(0, |life| life.generation())
    }

    /// Smoothed frame rate of host callbacks.
    #[wasm_bindgen]
    pub fn fps(&self) -> f64 {
        self.with_life(0.0, |life| life.scheduler().fps())
    }

    /// Statistics of the current generation as a promised JS object.
    #[wasm_bindgen(js_name = getStats)]
    pub fn get_stats(&self) -> Promise {
        let Some(life) = &self.life else {
            return Promise::resolve(&JsValue::NULL);
        };
        let stats = life.borrow().engine().stats_async();
        future_to_promise(async move {
            let stats = stats.await.map_err(js_error)?;
            serde_wasm_bindgen::to_value(&stats)
                .map_err(|e| JsValue::from_str(&format!("Serialization error: {e}")))
        })
    }
}
