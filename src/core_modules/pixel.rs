// THEORY (1D Pixel Heuristics):
// The `Pixel` module is the most fundamental unit of the inspection engine. It is a
// "dumb" data container for a single RGBA sample plus the handful of single-pixel
// heuristics the rest of the engine is built from. Anything that needs a neighbor
// (gradients, patches, histograms) lives in the metric modules; nothing here reads
// outside its own four bytes.
//
// Heuristic families (all single-pixel):
// - Brightness:  `brightness` is the plain channel mean (R+G+B)/3 used by the
//                pre-filter; `luminance` is the Rec. 601 luma used by every
//                structural and gradient metric.
// - Color spread: `channel_variance` = |R-G| + |G-B| + |B-R|. Zero for grays, grows
//                with how strongly one channel dominates. The pre-filter flags
//                molding irregularities with it.
// - HSV:          `value_hsv` (max channel) and `saturation_hsv` ((max-min)/max) in
//                0..1 on normalized sRGB. No linearization; the color-distribution
//                metric only needs a cheap, monotone proxy.

pub mod pixel {
    pub type Channel = u8;
    pub type Luminance = f64;
    pub type Brightness = f64;
    pub type ChannelVariance = u16;
    pub type ValueHSV = f64;
    pub type SaturationHSV = f64;

    pub const CHANNELS: usize = 4;

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        pub red: Channel,
        pub green: Channel,
        pub blue: Channel,
        pub alpha: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Self { red, green, blue, alpha }
        }

        /// Opaque gray pixel, handy for synthetic frames.
        pub fn gray(level: Channel) -> Self {
            Self::new(level, level, level, 255)
        }

        /// Luminance estimate (Rec. 601 luma) on the 0..255 scale.
        #[inline]
        pub fn luminance(&self) -> Luminance {
            0.299 * self.red as f64 + 0.587 * self.green as f64 + 0.114 * self.blue as f64
        }

        /// Unweighted channel mean on the 0..255 scale.
        #[inline]
        pub fn brightness(&self) -> Brightness {
            (self.red as u16 + self.green as u16 + self.blue as u16) as f64 / 3.0
        }

        /// Sum of absolute pairwise channel differences, 0..=510.
        #[inline]
        pub fn channel_variance(&self) -> ChannelVariance {
            let (r, g, b) = (self.red as i16, self.green as i16, self.blue as i16);
            ((r - g).abs() + (g - b).abs() + (b - r).abs()) as ChannelVariance
        }

        /// HSV Value: brightest channel, normalized to 0..1.
        #[inline]
        pub fn value_hsv(&self) -> ValueHSV {
            self.red.max(self.green).max(self.blue) as f64 / 255.0
        }

        /// HSV Saturation: chroma over value. Zero for black.
        #[inline]
        pub fn saturation_hsv(&self) -> SaturationHSV {
            let max = self.red.max(self.green).max(self.blue);
            if max == 0 {
                return 0.0;
            }
            let min = self.red.min(self.green).min(self.blue);
            (max - min) as f64 / max as f64
        }
    }

    impl From<&[u8]> for Pixel {
        /// Reads the first four bytes as RGBA. Shorter slices are padded with zeros
        /// (alpha defaults to opaque) instead of panicking.
        fn from(bytes: &[u8]) -> Self {
            let at = |i: usize, fallback: u8| bytes.get(i).copied().unwrap_or(fallback);
            Pixel::new(at(0, 0), at(1, 0), at(2, 0), at(3, 255))
        }
    }

    impl From<Pixel> for [u8; CHANNELS] {
        fn from(pixel: Pixel) -> Self {
            [pixel.red, pixel.green, pixel.blue, pixel.alpha]
        }
    }
}
