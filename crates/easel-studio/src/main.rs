use anyhow::Result;
use easel_engine::coords::Vec2;
use easel_engine::device::GpuInit;
use easel_engine::logging::{init_logging, LoggingConfig};
use easel_engine::text::FontAtlas;
use easel_engine::window::Runtime;
use easel_engine::{Color, Env, Sketch, SketchConfig};

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const TRAIL_LEN: usize = 24;

fn load_system_font() -> Option<Vec<u8>> {
    FONT_CANDIDATES.iter().find_map(|path| std::fs::read(path).ok())
}

/// Mouse trail with drag-to-draw strokes.
struct Trails {
    font: Option<FontAtlas>,
    trail: Vec<Vec2>,
    strokes: Vec<(Vec2, Vec2)>,
    last: Vec2,
}

impl Sketch for Trails {
    fn setup(env: &mut Env<'_>) -> Result<Self> {
        env.background((24, 26, 33));

        let font = match load_system_font() {
            Some(bytes) => match env.load_font(&bytes, 18.0) {
                Ok(atlas) => Some(atlas),
                Err(e) => {
                    log::warn!("{e}; text disabled");
                    None
                }
            },
            None => {
                log::warn!("no system font found; text disabled");
                None
            }
        };

        Ok(Self {
            font,
            trail: Vec::with_capacity(TRAIL_LEN),
            strokes: Vec::new(),
            last: Vec2::zero(),
        })
    }

    fn draw(mut self, env: &mut Env<'_>) -> Result<Self> {
        env.background((24, 26, 33));

        if self.trail.len() == TRAIL_LEN {
            self.trail.remove(0);
        }
        self.trail.push(env.mouse());

        env.stroke((230, 120, 60));
        env.stroke_weight(4.0);
        for &(a, b) in &self.strokes {
            env.line(a, b);
        }

        for (i, &p) in self.trail.iter().enumerate() {
            let t = (i + 1) as f32 / TRAIL_LEN as f32;
            env.fill(Color::clamped(80, (120.0 + 135.0 * t) as i32, 220));
            env.ellipse(p, 3.0 + 9.0 * t, 3.0 + 9.0 * t)?;
        }

        if let Some(font) = &self.font {
            let label = format!("{} fps  frame {}", env.frame_rate(), env.frame_count());
            env.text(font, &label, 10.0, 10.0)?;
        }

        Ok(self)
    }

    fn mouse_dragged(mut self, env: &mut Env<'_>) -> Result<Self> {
        self.strokes.push((self.last, env.mouse()));
        self.last = env.mouse();
        Ok(self)
    }

    fn mouse_down(mut self, env: &mut Env<'_>) -> Result<Self> {
        log::debug!("pressed at {:?}", env.mouse());
        self.strokes.clear();
        self.last = env.mouse();
        Ok(self)
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = SketchConfig {
        title: "easel studio".to_string(),
        width: 400,
        height: 300,
        ..SketchConfig::default()
    };

    Runtime::run::<Trails>(config, GpuInit::default())
}
