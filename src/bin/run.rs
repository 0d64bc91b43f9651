//! A reference host embedder: wires the VM core to an SDL2 window, a
//! square-wave mixer, and keyboard/mouse input.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use rand::Rng;
use sdl2::audio::{AudioCallback, AudioDevice, AudioSpecDesired};
use sdl2::event::Event as SdlEvent;
use sdl2::keyboard::Scancode;
use sdl2::pixels::Color;
use sdl2::rect::Rect as SdlRect;
use sdl2::render::Canvas;
use sdl2::video::Window;

use simpleos::logging::error;
use simpleos::vm::{Colour, Event, InputSource, Mixer, RandomSource, Rect, Renderer, Vm, VmError};

const AUDIO_SAMPLE_RATE: f32 = 44100.0;
const AUDIO_TARGET_FREQUENCY: f32 = 440.0;
const MAX_EVENT_QUEUE: usize = 1000;

struct SquareWave {
    phase: f32,
    volume: f32,
}

impl AudioCallback for SquareWave {
    type Channel = f32;

    fn callback(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            self.phase = (self.phase + AUDIO_TARGET_FREQUENCY / AUDIO_SAMPLE_RATE) % 1.0;
            *sample = if self.phase < 0.5 { self.volume } else { -self.volume };
        }
    }
}

struct SdlRenderer {
    canvas: Canvas<Window>,
    sprite_sizes: Vec<usize>,
}

impl Renderer for SdlRenderer {
    fn load_sprite(&mut self, index: u32, _extension: &str, bytes: &[u8]) -> Result<(), VmError> {
        let index = index as usize;
        if self.sprite_sizes.len() <= index {
            self.sprite_sizes.resize(index + 1, 0);
        }
        self.sprite_sizes[index] = bytes.len();
        Ok(())
    }

    fn draw_fill(&mut self, rect: Rect, colour: Colour) {
        self.canvas.set_draw_color(Color::RGBA(colour.r, colour.g, colour.b, colour.a));
        let _ = self.canvas.fill_rect(SdlRect::new(rect.x as i32, rect.y as i32, rect.w as u32, rect.h as u32));
    }

    fn draw_sprite(&mut self, rect: Rect, index: u32) -> Result<(), VmError> {
        if index as usize >= self.sprite_sizes.len() {
            return Err(VmError::NoSuchSprite);
        }
        // Sprite decoding (PNG/BMP/etc.) is an embedder concern outside the
        // VM core; stand in with a flat-coloured rect so the reference
        // binary stays runnable without an image codec dependency.
        self.canvas.set_draw_color(Color::RGB(200, 200, 200));
        let _ = self.canvas.fill_rect(SdlRect::new(rect.x as i32, rect.y as i32, rect.w as u32, rect.h as u32));
        Ok(())
    }

    fn clear(&mut self, rect: Rect, default_colour: Colour) {
        // Programs clear the screen once per frame before redrawing, so
        // presenting the previous frame's accumulated draws here keeps the
        // window in sync without the VM core knowing anything about
        // present/flip semantics.
        self.canvas.present();
        self.draw_fill(rect, default_colour);
    }
}

struct SdlMixer {
    device: AudioDevice<SquareWave>,
    music_count: usize,
    sound_count: usize,
}

impl Mixer for SdlMixer {
    fn load_music(&mut self, index: u32, _extension: &str, _bytes: &[u8]) -> Result<(), VmError> {
        self.music_count = self.music_count.max(index as usize + 1);
        Ok(())
    }

    fn load_sound(&mut self, index: u32, _extension: &str, _bytes: &[u8]) -> Result<(), VmError> {
        self.sound_count = self.sound_count.max(index as usize + 1);
        Ok(())
    }

    fn play_music(&mut self, index: u32, volume_db: f64) -> Result<(), VmError> {
        if index as usize >= self.music_count {
            return Err(VmError::NoSuchMusic);
        }
        self.device.lock().volume = decibels_to_linear(volume_db);
        Ok(())
    }

    fn stop_music(&mut self) {
        self.device.lock().volume = 0.0;
    }

    fn play_sound(&mut self, index: u32, volume_db: f64) -> Result<(), VmError> {
        if index as usize >= self.sound_count {
            return Err(VmError::NoSuchSound);
        }
        self.device.lock().volume = decibels_to_linear(volume_db);
        Ok(())
    }
}

fn decibels_to_linear(db: f64) -> f32 {
    if db.is_infinite() {
        0.0
    } else {
        10f64.powf(db / 20.0) as f32
    }
}

/// Drains the SDL event pump lazily, the first time the VM asks for
/// ticks each frame, since `Vm` holds this behind `&mut dyn InputSource`
/// for its whole lifetime and the embedder has no other hook into it.
struct SdlInput<'a> {
    event_pump: sdl2::EventPump,
    queue: VecDeque<Event>,
    start: &'a Instant,
    quit: Rc<Cell<bool>>,
}

impl<'a> InputSource for SdlInput<'a> {
    fn poll_event(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    fn mouse_position(&mut self) -> (u16, u16) {
        self.drain_pump();
        let state = self.event_pump.mouse_state();
        (state.x().max(0) as u16, state.y().max(0) as u16)
    }

    fn now_ticks_ms(&mut self) -> u64 {
        self.drain_pump();
        self.start.elapsed().as_millis() as u64
    }
}

impl<'a> SdlInput<'a> {
    fn drain_pump(&mut self) {
        for event in self.event_pump.poll_iter() {
            match event {
                SdlEvent::Quit { .. } => self.quit.set(true),
                SdlEvent::KeyDown { scancode: Some(Scancode::Escape), .. } => self.quit.set(true),
                SdlEvent::KeyDown { scancode: Some(code), .. } => {
                    push_bounded(&mut self.queue, Event::KeyPressed(code as u64));
                }
                SdlEvent::KeyUp { scancode: Some(code), .. } => {
                    push_bounded(&mut self.queue, Event::KeyReleased(code as u64));
                }
                SdlEvent::MouseButtonDown { x, y, mouse_btn, .. } => {
                    push_bounded(
                        &mut self.queue,
                        Event::MousePressed { x: x.max(0) as u16, y: y.max(0) as u16, button: mouse_btn as u16 },
                    );
                }
                SdlEvent::MouseButtonUp { x, y, mouse_btn, .. } => {
                    push_bounded(
                        &mut self.queue,
                        Event::MouseReleased { x: x.max(0) as u16, y: y.max(0) as u16, button: mouse_btn as u16 },
                    );
                }
                _ => {}
            }
        }
    }
}

fn push_bounded(queue: &mut VecDeque<Event>, event: Event) {
    if queue.len() >= MAX_EVENT_QUEUE {
        queue.pop_front();
    }
    queue.push_back(event);
}

struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_u64(&mut self) -> u64 {
        rand::rng().random()
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <program.sox>", args[0]);
        std::process::exit(1);
    }

    let bytes = std::fs::read(&args[1]).unwrap_or_else(|e| {
        error(format!("failed to read {}: {}", args[1], e));
        std::process::exit(2);
    });

    let sdl_context = sdl2::init().unwrap();
    let video = sdl_context.video().unwrap();
    let window = video.window("simpleos", 640, 480).position_centered().build().unwrap();
    let canvas = window.into_canvas().build().unwrap();
    let event_pump = sdl_context.event_pump().unwrap();

    let audio = sdl_context.audio().unwrap();
    let desired_spec = AudioSpecDesired { freq: Some(AUDIO_SAMPLE_RATE as i32), channels: Some(1), samples: None };
    let device = audio.open_playback(None, &desired_spec, |_spec| SquareWave { phase: 0.0, volume: 0.0 }).unwrap();
    device.resume();

    let start = Instant::now();
    let quit = Rc::new(Cell::new(false));
    let mut renderer = SdlRenderer { canvas, sprite_sizes: Vec::new() };
    let mut mixer = SdlMixer { device, music_count: 0, sound_count: 0 };
    let mut input = SdlInput { event_pump, queue: VecDeque::new(), start: &start, quit: Rc::clone(&quit) };
    let mut random = ThreadRandom;

    let mut vm = Vm::new(&mut renderer, &mut mixer, &mut input, &mut random);
    vm.load(&bytes).unwrap_or_else(|e| {
        error(e.to_string());
        std::process::exit(3);
    });

    let mut last_frame = Instant::now();
    while !quit.get() {
        let now = Instant::now();
        let delta_micros = now.duration_since(last_frame).as_micros() as i64;
        last_frame = now;

        if let Err(e) = vm.step_frame(delta_micros) {
            error(e.to_string());
            break;
        }
    }
}
