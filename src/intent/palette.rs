//! Fixed LED colour palette: eight colours, each in a light, base and dark shade.

/// 8-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Colours the LED intent understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Colour {
    Red,
    White,
    Pink,
    Purple,
    Orange,
    Yellow,
    Green,
    Blue,
}

impl Colour {
    pub const ALL: [Colour; 8] = [
        Self::Red,
        Self::White,
        Self::Pink,
        Self::Purple,
        Self::Orange,
        Self::Yellow,
        Self::Green,
        Self::Blue,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::White => "white",
            Self::Pink => "pink",
            Self::Purple => "purple",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Blue => "blue",
        }
    }

    /// Case-insensitive, surrounding whitespace ignored.
    pub fn from_spoken(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| c.name() == value)
    }

    pub const fn rgb(self, shade: Shade) -> Rgb {
        match (self, shade) {
            (Self::Red, Shade::Light) => Rgb::new(255, 127, 127),
            (Self::Red, Shade::Base) => Rgb::new(255, 0, 0),
            (Self::Red, Shade::Dark) => Rgb::new(139, 0, 0),
            (Self::White, Shade::Light | Shade::Base) => Rgb::new(255, 255, 255),
            (Self::White, Shade::Dark) => Rgb::new(200, 200, 200),
            (Self::Pink, Shade::Light) => Rgb::new(255, 220, 230),
            (Self::Pink, Shade::Base) => Rgb::new(255, 192, 203),
            (Self::Pink, Shade::Dark) => Rgb::new(219, 112, 147),
            (Self::Purple, Shade::Light) => Rgb::new(200, 100, 255),
            (Self::Purple, Shade::Base) => Rgb::new(128, 0, 128),
            (Self::Purple, Shade::Dark) => Rgb::new(75, 0, 130),
            (Self::Orange, Shade::Light) => Rgb::new(255, 200, 124),
            (Self::Orange, Shade::Base) => Rgb::new(255, 165, 0),
            (Self::Orange, Shade::Dark) => Rgb::new(255, 140, 0),
            (Self::Yellow, Shade::Light) => Rgb::new(255, 255, 153),
            (Self::Yellow, Shade::Base) => Rgb::new(255, 255, 0),
            (Self::Yellow, Shade::Dark) => Rgb::new(204, 204, 0),
            (Self::Green, Shade::Light) => Rgb::new(144, 238, 144),
            (Self::Green, Shade::Base) => Rgb::new(0, 255, 0),
            (Self::Green, Shade::Dark) => Rgb::new(0, 100, 0),
            (Self::Blue, Shade::Light) => Rgb::new(173, 216, 230),
            (Self::Blue, Shade::Base) => Rgb::new(0, 0, 255),
            (Self::Blue, Shade::Dark) => Rgb::new(0, 0, 139),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Shade {
    Light,
    #[default]
    Base,
    Dark,
}

impl Shade {
    /// A missing or blank shade is [`Shade::Base`]; otherwise "light" or "dark".
    pub fn from_spoken(value: Option<&str>) -> Option<Self> {
        let value = value.map(|v| v.trim().to_lowercase()).unwrap_or_default();
        match value.as_str() {
            "" => Some(Self::Base),
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dark_red() {
        assert_eq!(Colour::Red.rgb(Shade::Dark), Rgb::new(139, 0, 0));
    }

    #[test]
    fn test_light_and_base_white_match() {
        assert_eq!(Colour::White.rgb(Shade::Light), Colour::White.rgb(Shade::Base));
    }

    #[test]
    fn test_every_colour_has_distinct_dark_shade() {
        for colour in Colour::ALL {
            assert_ne!(colour.rgb(Shade::Dark), colour.rgb(Shade::Base), "{:?}", colour);
        }
    }

    #[test]
    fn test_spoken_values_normalized() {
        assert_eq!(Colour::from_spoken(" BLUE "), Some(Colour::Blue));
        assert_eq!(Shade::from_spoken(Some("Dark ")), Some(Shade::Dark));
        assert_eq!(Shade::from_spoken(Some(" ")), Some(Shade::Base));
        assert_eq!(Shade::from_spoken(None), Some(Shade::Base));
    }

    #[test]
    fn test_unknown_colour_or_shade() {
        assert_eq!(Colour::from_spoken("octarine"), None);
        assert_eq!(Colour::from_spoken("dark red"), None);
        assert_eq!(Shade::from_spoken(Some("bright")), None);
    }
}
