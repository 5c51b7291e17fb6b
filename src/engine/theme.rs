//! Colours and type sizes shared by both PDF engines.

/// An sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn hex(v: u32) -> Self {
        Self {
            r: ((v >> 16) & 0xff) as u8,
            g: ((v >> 8) & 0xff) as u8,
            b: (v & 0xff) as u8,
        }
    }

    /// Components in 0.0–1.0, as PDF colour operators expect.
    pub fn unit(self) -> (f32, f32, f32) {
        (
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        )
    }

    pub fn css(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

pub const TEXT: Rgb = Rgb::hex(0x333333);
pub const INLINE_CODE: Rgb = Rgb::hex(0x666666);
pub const H1: Rgb = Rgb::hex(0x2c3e50);
pub const H2: Rgb = Rgb::hex(0x34495e);
pub const H3: Rgb = Rgb::hex(0x555555);
pub const H4: Rgb = Rgb::hex(0x666666);
pub const H1_RULE: Rgb = Rgb::hex(0x3498db);
pub const H2_RULE: Rgb = Rgb::hex(0x95a5a6);
pub const CODE_BG: Rgb = Rgb::hex(0xf8f8f8);
pub const CODE_BORDER: Rgb = Rgb::hex(0xdddddd);
pub const TABLE_HEADER_BG: Rgb = Rgb::hex(0x3498db);
pub const TABLE_HEADER_TEXT: Rgb = Rgb::hex(0xffffff);
pub const TABLE_ROW: Rgb = Rgb::hex(0xffffff);
pub const TABLE_ROW_ALT: Rgb = Rgb::hex(0xf9f9f9);
pub const TABLE_GRID: Rgb = Rgb::hex(0xdddddd);
pub const RULE: Rgb = Rgb::hex(0xcccccc);
pub const FOOTER: Rgb = Rgb::hex(0x888888);

pub const BODY_SIZE: f32 = 11.0;
pub const TABLE_SIZE: f32 = 9.0;
pub const CODE_SIZE: f32 = 8.0;
pub const FOOTER_SIZE: f32 = 9.0;

/// Font size in points for heading levels 1–4.
pub fn heading_size(level: u8) -> f32 {
    match level {
        1 => 20.0,
        2 => 16.0,
        3 => 14.0,
        _ => 12.0,
    }
}

pub fn heading_color(level: u8) -> Rgb {
    match level {
        1 => H1,
        2 => H2,
        3 => H3,
        _ => H4,
    }
}

/// Colour and thickness of the rule drawn beneath H1 and H2.
pub fn heading_rule(level: u8) -> Option<(Rgb, f32)> {
    match level {
        1 => Some((H1_RULE, 2.0)),
        2 => Some((H2_RULE, 1.0)),
        _ => None,
    }
}
