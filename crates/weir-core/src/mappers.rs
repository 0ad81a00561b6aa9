//! Per-sample transforms applied by [`MapOp`](crate::ops::MapOp).

use std::sync::Arc;

use indexmap::IndexMap;

use crate::parsers::Parser;
use crate::sample::Sample;
use crate::{Error, ErrorKind, Result};

/// A pure `(index, sample) → sample` transform.
///
/// Mappers never observe dataset state beyond the sample they are given,
/// and are implemented for plain closures:
///
/// ```
/// use weir_core::mappers::Mapper;
/// use weir_core::Sample;
///
/// let drop_mask = |_: usize, sample: Sample| Ok(sample.without(&["mask"]));
/// let sample = Sample::typeless([]);
/// assert!(drop_mask.map(0, sample).is_ok());
/// ```
pub trait Mapper: Send + Sync {
    /// Transforms the sample at `index`.
    fn map(&self, index: usize, sample: Sample) -> Result<Sample>;
}

impl<F> Mapper for F
where
    F: Fn(usize, Sample) -> Result<Sample> + Send + Sync,
{
    fn map(&self, index: usize, sample: Sample) -> Result<Sample> {
        self(index, sample)
    }
}

/// Re-parsers selected items with new codecs.
pub struct ConvertMapper {
    parsers: IndexMap<String, Arc<dyn Parser>>,
}

impl ConvertMapper {
    /// Creates a mapper swapping the parser of each listed key.
    ///
    /// Keys absent from a sample are ignored.
    #[must_use]
    pub fn new(parsers: impl IntoIterator<Item = (String, Arc<dyn Parser>)>) -> Self {
        Self {
            parsers: parsers.into_iter().collect(),
        }
    }
}

impl Mapper for ConvertMapper {
    fn map(&self, _index: usize, sample: Sample) -> Result<Sample> {
        let updates: Vec<_> = self
            .parsers
            .iter()
            .filter_map(|(key, parser)| {
                let item = sample.item(key)?;
                Some((key.clone(), item.with_parser(Arc::clone(parser))))
            })
            .collect();
        Ok(sample.with_items(updates))
    }
}

/// Flips the shared-flag of selected items.
#[derive(Debug)]
pub struct ShareMapper {
    share: Vec<String>,
    unshare: Vec<String>,
}

impl ShareMapper {
    /// Creates a mapper marking `share` keys shared and `unshare` keys not.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Config`] when the two sets overlap.
    pub fn new(
        share: impl IntoIterator<Item = String>,
        unshare: impl IntoIterator<Item = String>,
    ) -> Result<Self> {
        let share: Vec<String> = share.into_iter().collect();
        let unshare: Vec<String> = unshare.into_iter().collect();
        if let Some(key) = share.iter().find(|key| unshare.contains(key)) {
            let message = format!("key '{key}' appears in both share and unshare");
            return Err(Error::new(ErrorKind::Config, message));
        }
        Ok(Self { share, unshare })
    }
}

impl Mapper for ShareMapper {
    fn map(&self, _index: usize, sample: Sample) -> Result<Sample> {
        let updates: Vec<_> = sample
            .iter()
            .filter_map(|(key, item)| {
                if !item.is_shared() && self.share.iter().any(|k| k == key) {
                    Some((key.to_owned(), item.with_sharedness(true)))
                } else if item.is_shared() && self.unshare.iter().any(|k| k == key) {
                    Some((key.to_owned(), item.with_sharedness(false)))
                } else {
                    None
                }
            })
            .collect();
        Ok(sample.with_items(updates))
    }
}

/// Duplicates one item under a second key.
pub struct DuplicateItemMapper {
    source_key: String,
    dest_key: String,
}

impl DuplicateItemMapper {
    /// Creates a mapper copying `source_key` to `dest_key`.
    pub fn new(source_key: impl Into<String>, dest_key: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into(),
            dest_key: dest_key.into(),
        }
    }
}

impl Mapper for DuplicateItemMapper {
    fn map(&self, _index: usize, sample: Sample) -> Result<Sample> {
        let item = sample.item(&self.source_key).cloned().ok_or_else(|| {
            let message = format!("no item under key '{}'", self.source_key);
            Error::new(ErrorKind::Config, message)
        })?;
        Ok(sample.to_typeless().with_item(self.dest_key.clone(), item))
    }
}

/// Renames keys following a format string.
///
/// Any `*` in the format is replaced with the source key; a format without
/// `*` is appended as a suffix. An empty format leaves keys untouched.
pub struct KeyFormatMapper {
    format: String,
    apply_to: Option<Vec<String>>,
}

impl KeyFormatMapper {
    const FMT_CHAR: char = '*';

    /// Creates a mapper applying `format` to every key.
    pub fn new(format: impl Into<String>) -> Self {
        let mut format = format.into();
        if !format.contains(Self::FMT_CHAR) {
            format.insert(0, Self::FMT_CHAR);
        }
        Self {
            format,
            apply_to: None,
        }
    }

    /// Restricts the format to the listed keys.
    #[must_use]
    pub fn apply_to(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.apply_to = Some(keys.into_iter().collect());
        self
    }
}

impl Mapper for KeyFormatMapper {
    fn map(&self, _index: usize, sample: Sample) -> Result<Sample> {
        let keys: Vec<String> = match &self.apply_to {
            Some(keys) => keys.clone(),
            None => sample.keys().map(str::to_owned).collect(),
        };
        let renames: Vec<(String, String)> = keys
            .iter()
            .map(|key| {
                let to = self.format.replace(Self::FMT_CHAR, key);
                (key.clone(), to)
            })
            .collect();
        let fromto: Vec<(&str, &str)> = renames
            .iter()
            .map(|(from, to)| (from.as_str(), to.as_str()))
            .collect();
        Ok(sample.remap(&fromto, false))
    }
}

/// Renames keys through an explicit mapping.
pub struct RenameMapper {
    fromto: Vec<(String, String)>,
    exclude: bool,
}

impl RenameMapper {
    /// Creates a mapper renaming each `(from, to)` pair.
    ///
    /// With `exclude = true`, only the listed source keys survive.
    #[must_use]
    pub fn new(fromto: impl IntoIterator<Item = (String, String)>, exclude: bool) -> Self {
        Self {
            fromto: fromto.into_iter().collect(),
            exclude,
        }
    }
}

impl Mapper for RenameMapper {
    fn map(&self, _index: usize, sample: Sample) -> Result<Sample> {
        let fromto: Vec<(&str, &str)> = self
            .fromto
            .iter()
            .map(|(from, to)| (from.as_str(), to.as_str()))
            .collect();
        Ok(sample.remap(&fromto, self.exclude))
    }
}

/// Keeps or drops the listed keys.
pub struct FilterKeysMapper {
    keys: Vec<String>,
    negate: bool,
}

impl FilterKeysMapper {
    /// Creates a mapper keeping the listed keys, or dropping them when
    /// `negate` is set.
    #[must_use]
    pub fn new(keys: impl IntoIterator<Item = String>, negate: bool) -> Self {
        Self {
            keys: keys.into_iter().collect(),
            negate,
        }
    }
}

impl Mapper for FilterKeysMapper {
    fn map(&self, _index: usize, sample: Sample) -> Result<Sample> {
        let keys: Vec<&str> = self.keys.iter().map(String::as_str).collect();
        Ok(if self.negate {
            sample.without(&keys)
        } else {
            sample.with_only(&keys)
        })
    }
}

/// Wraps every item of the sample in a memoizing layer.
///
/// Repeated [`Item::get`] calls on the same sample handle then hit memory
/// after the first read.
#[derive(Clone, Copy, Debug, Default)]
pub struct CacheMapper {
    _priv: (),
}

impl CacheMapper {
    /// Creates a new [`CacheMapper`].
    #[must_use]
    pub const fn new() -> Self {
        Self { _priv: () }
    }
}

impl Mapper for CacheMapper {
    fn map(&self, _index: usize, sample: Sample) -> Result<Sample> {
        let cached: Vec<_> = sample
            .iter()
            .map(|(key, item)| (key.to_owned(), item.clone().into_cached()))
            .collect();
        Ok(sample.with_items(cached))
    }
}

/// Chains several mappers into one.
pub struct ComposeMapper {
    mappers: Vec<Arc<dyn Mapper>>,
}

impl ComposeMapper {
    /// Creates a mapper applying `mappers` left to right.
    #[must_use]
    pub fn new(mappers: impl IntoIterator<Item = Arc<dyn Mapper>>) -> Self {
        Self {
            mappers: mappers.into_iter().collect(),
        }
    }
}

impl Mapper for ComposeMapper {
    fn map(&self, index: usize, sample: Sample) -> Result<Sample> {
        let mut current = sample;
        for mapper in &self.mappers {
            current = mapper.map(index, current)?;
        }
        Ok(current)
    }
}
