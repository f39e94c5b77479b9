use bitflags::bitflags;

bitflags! {
    /// State axes a save region captures and neutralizes.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SaveMask: u32 {
        const ALPHA_TEST = 1 << 0;
        const BLEND = 1 << 1;
        const COLOR_MASK = 1 << 2;
        const DEPTH_TEST = 1 << 3;
        const FOG = 1 << 4;
        const PIXEL_STORE = 1 << 5;
        const PIXEL_TRANSFER = 1 << 6;
        const RASTERIZATION = 1 << 7;
        const SCISSOR = 1 << 8;
        const SHADER = 1 << 9;
        const STENCIL_TEST = 1 << 10;
        const TRANSFORM = 1 << 11;
        const TEXTURE = 1 << 12;
        const VERTEX = 1 << 13;
        const VIEWPORT = 1 << 14;
        const CLAMP_FRAGMENT_COLOR = 1 << 15;
        const CLAMP_VERTEX_COLOR = 1 << 16;
        const CONDITIONAL_RENDER = 1 << 17;
        const CLIP = 1 << 18;
        const SELECT_FEEDBACK = 1 << 19;
        const MULTISAMPLE = 1 << 20;
        const FRAMEBUFFER_SRGB = 1 << 21;
        const DRAW_BUFFERS = 1 << 22;
        /// Lighting and rasterizer discard.
        const MISC = 1 << 23;

        const ALL = (1 << 24) - 1;
    }
}
