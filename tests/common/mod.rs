use std::borrow::Cow;

use gif::{DisposalMethod, Encoder, Frame, Repeat};

/// Palette shared by the fixtures: 0 red, 1 blue, 2 green, 3 black.
pub const PALETTE: [u8; 12] = [255, 0, 0, 0, 0, 255, 0, 255, 0, 0, 0, 0];
pub const TRANSPARENT: u8 = 3;

pub struct Patch {
    pub rect: (u16, u16, u16, u16),
    pub indices: Vec<u8>,
    pub dispose: DisposalMethod,
    pub delay: u16,
}

impl Patch {
    pub fn new(rect: (u16, u16, u16, u16), indices: Vec<u8>, dispose: DisposalMethod) -> Self {
        Patch { rect, indices, dispose, delay: 5 }
    }
}

/// Encodes `patches` as an infinitely looping GIF with a `width`x`height` screen.
pub fn encode_gif(width: u16, height: u16, patches: &[Patch]) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut encoder = Encoder::new(&mut bytes, width, height, &PALETTE).unwrap();
        encoder.set_repeat(Repeat::Infinite).unwrap();
        for patch in patches {
            let (left, top, w, h) = patch.rect;
            let frame = Frame {
                left,
                top,
                width: w,
                height: h,
                delay: patch.delay,
                dispose: patch.dispose,
                transparent: Some(TRANSPARENT),
                buffer: Cow::Owned(patch.indices.clone()),
                ..Frame::default()
            };
            encoder.write_frame(&frame).unwrap();
        }
    }
    bytes
}
