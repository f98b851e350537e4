use std::cell::OnceCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use image::RgbaImage;

use crate::device::{GraphicsBackend, TextureFilter, TextureId};

/// A texture that finished loading.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Image {
    pub texture: TextureId,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AssetState {
    Pending,
    Ready(Image),
}

/// Shared reference to an image that may still be loading.
///
/// Starts pending and becomes ready exactly once, on the render thread,
/// during [`AssetLoader::poll`]. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct ImageHandle(Rc<OnceCell<Image>>);

impl ImageHandle {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AssetState {
        match self.0.get() {
            Some(img) => AssetState::Ready(*img),
            None => AssetState::Pending,
        }
    }

    #[inline]
    pub fn get(&self) -> Option<Image> {
        self.0.get().copied()
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.0.get().is_some()
    }

    fn fill(&self, img: Image) {
        if self.0.set(img).is_err() {
            log::warn!("image handle filled twice; keeping the first texture");
        }
    }
}

struct Decoded {
    id: u64,
    result: Result<RgbaImage, String>,
}

/// Where a pending request came from, for diagnostics.
#[derive(Debug, Clone)]
enum Source {
    File(PathBuf),
    Memory,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::File(p) => write!(f, "'{}'", p.display()),
            Source::Memory => f.write_str("in-memory image"),
        }
    }
}

/// Decodes images off the render thread and uploads them on it.
///
/// Decoding runs on a short-lived worker thread per request. Results come
/// back over a channel and are turned into textures by [`poll`](Self::poll),
/// which the frame loop calls at the start of every tick. A request that
/// fails to decode is logged once and its handle stays pending.
pub struct AssetLoader {
    tx: Sender<Decoded>,
    rx: Receiver<Decoded>,
    next_id: u64,
    pending: HashMap<u64, (ImageHandle, Source)>,
}

impl AssetLoader {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            next_id: 0,
            pending: HashMap::new(),
        }
    }

    /// Starts loading an image file. Returns immediately.
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> ImageHandle {
        let path = path.as_ref().to_path_buf();
        let (id, handle) = self.register(Source::File(path.clone()));
        self.spawn_decode(id, move || {
            image::open(&path)
                .map(|img| img.to_rgba8())
                .map_err(|e| e.to_string())
        });
        handle
    }

    /// Starts decoding an encoded image (PNG, JPEG, ...) held in memory.
    pub fn load_image_bytes(&mut self, bytes: Vec<u8>) -> ImageHandle {
        let (id, handle) = self.register(Source::Memory);
        self.spawn_decode(id, move || {
            image::load_from_memory(&bytes)
                .map(|img| img.to_rgba8())
                .map_err(|e| e.to_string())
        });
        handle
    }

    /// Queues already-decoded pixels. Uploaded on the next poll.
    pub fn queue_rgba(&mut self, pixels: RgbaImage) -> ImageHandle {
        let (id, handle) = self.register(Source::Memory);
        // The receiver lives in `self`, so this cannot fail.
        let _ = self.tx.send(Decoded { id, result: Ok(pixels) });
        handle
    }

    /// Requests not yet uploaded or failed.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Uploads every finished decode and fills its handle.
    ///
    /// Returns how many handles became ready.
    pub fn poll(&mut self, gl: &mut dyn GraphicsBackend) -> usize {
        let mut ready = 0;
        loop {
            let decoded = match self.rx.try_recv() {
                Ok(d) => d,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            };

            let Some((handle, source)) = self.pending.remove(&decoded.id) else {
                continue;
            };

            match decoded.result {
                Ok(pixels) => {
                    handle.fill(upload(gl, &pixels));
                    log::debug!(
                        "loaded {source} ({}x{})",
                        pixels.width(),
                        pixels.height()
                    );
                    ready += 1;
                }
                Err(e) => log::error!("could not load image {source}: {e}"),
            }
        }
        ready
    }

    fn register(&mut self, source: Source) -> (u64, ImageHandle) {
        let id = self.next_id;
        self.next_id += 1;
        let handle = ImageHandle::pending();
        self.pending.insert(id, (handle.clone(), source));
        (id, handle)
    }

    fn spawn_decode<F>(&mut self, id: u64, decode: F)
    where
        F: FnOnce() -> Result<RgbaImage, String> + Send + 'static,
    {
        let tx = self.tx.clone();
        let spawned = std::thread::Builder::new()
            .name("easel-image-decode".into())
            .spawn(move || {
                let _ = tx.send(Decoded { id, result: decode() });
            });

        if let Err(e) = spawned {
            let _ = self.tx.send(Decoded {
                id,
                result: Err(format!("failed to spawn decode thread: {e}")),
            });
        }
    }
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn upload(gl: &mut dyn GraphicsBackend, pixels: &RgbaImage) -> Image {
    let texture = gl.create_texture();
    gl.upload_texture_rgba(texture, pixels.width(), pixels.height(), pixels.as_raw());
    gl.set_texture_filter(texture, TextureFilter::Linear, TextureFilter::Linear);
    Image {
        texture,
        width: pixels.width(),
        height: pixels.height(),
    }
}
