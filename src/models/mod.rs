mod card;
mod group;
mod patch;
mod repeat;
mod series;

pub use card::{Card, CardView, Geolocation};
pub use group::{CountedGroup, Group};
pub use patch::{CardPatch, ImageDelta, PatchParts, SeriesFields};
pub use repeat::Repeat;
pub use series::{CardTemplate, Series};
