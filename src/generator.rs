//! Deterministic generation of benchmark records and datasets.
//!
//! A [`Generator`] owns one `ChaCha8Rng` seeded from its configuration and
//! threads it through every draw, so two generators built from the same
//! [`GeneratorConfig`] produce identical output call for call.
//!
//! Users reference groups from a small shared pool that is built once at
//! construction. Each user also gets one freshly minted group, so nested
//! datasets always contain both first-seen and repeated sub-objects.

use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::convert;
use crate::error::GenerationError;
use crate::experiment::Experiment;
use crate::model::UserModel;
use crate::record::{
    ArrayData, Dataset, Group, NumericArray, Opaque, Record, Timestamp, Uid, User, UserType,
};

/// 1970-01-01T00:00:00Z
pub const MIN_TIME: i64 = 0;
/// 2514-01-01T00:00:00Z
pub const MAX_TIME: i64 = 17_166_988_800;

/// Letter code points of one script.
#[derive(Clone, Debug, PartialEq)]
pub struct Alphabet {
    letters: Vec<char>,
}

impl Alphabet {
    /// Collects the alphabetic characters inside `ranges`.
    pub fn from_ranges(ranges: &[RangeInclusive<char>]) -> Self {
        let letters = ranges
            .iter()
            .flat_map(|r| r.clone())
            .filter(|c| c.is_alphabetic())
            .collect();
        Self { letters }
    }

    pub fn ascii() -> Self {
        Self::from_ranges(&['A'..='Z', 'a'..='z'])
    }

    pub fn hiragana() -> Self {
        Self::from_ranges(&['\u{3041}'..='\u{3096}', '\u{309D}'..='\u{309F}'])
    }

    pub fn letters(&self) -> &[char] {
        &self.letters
    }
}

#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub seed: u64,
    /// Names of the shared group pool.
    pub pool: Vec<String>,
    pub alphabets: Vec<Alphabet>,
    /// Upper bound of generated string lengths, in characters.
    pub max_string_len: usize,
    /// Unix seconds, inclusive.
    pub min_time: i64,
    pub max_time: i64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            pool: vec!["daemon".into(), "mail".into(), "wheel".into()],
            alphabets: vec![Alphabet::ascii(), Alphabet::hiragana()],
            max_string_len: 64,
            min_time: MIN_TIME,
            max_time: MAX_TIME,
        }
    }
}

/// Size of the datasets in one benchmark session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scale {
    pub record_count: usize,
    /// Rows of the 2-D arrays, elements of the 1-D array.
    pub array_element_count: usize,
    /// Second dimension of the 2-D arrays.
    pub array_width: usize,
}

impl Default for Scale {
    fn default() -> Self {
        Self {
            record_count: 100,
            array_element_count: 100_000,
            array_width: 100,
        }
    }
}

impl Scale {
    pub fn validate(&self) -> Result<(), GenerationError> {
        for (field, value) in [
            ("record_count", self.record_count),
            ("array_element_count", self.array_element_count),
            ("array_width", self.array_width),
        ] {
            if value == 0 {
                return Err(GenerationError::NonPositive { field, value });
            }
        }
        Ok(())
    }
}

pub struct Generator {
    rng: ChaCha8Rng,
    alphabets: Vec<Alphabet>,
    pool: Vec<Arc<Group>>,
    max_string_len: usize,
    min_time: i64,
    max_time: i64,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerationError> {
        if config.alphabets.is_empty() {
            return Err(GenerationError::NoAlphabets);
        }
        if let Some(index) = config.alphabets.iter().position(|a| a.letters.is_empty()) {
            return Err(GenerationError::EmptyAlphabet { index });
        }
        if config.pool.is_empty() {
            return Err(GenerationError::EmptyPool);
        }
        if config.max_string_len == 0 {
            return Err(GenerationError::NonPositive {
                field: "max_string_len",
                value: 0,
            });
        }
        // Both bounds must be representable so that every draw in between is.
        if config.min_time > config.max_time
            || DateTime::from_timestamp(config.min_time, 0).is_none()
            || DateTime::from_timestamp(config.max_time, 0).is_none()
        {
            return Err(GenerationError::TimeRange {
                min: config.min_time,
                max: config.max_time,
            });
        }

        let mut gen = Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            alphabets: config.alphabets,
            pool: Vec::with_capacity(config.pool.len()),
            max_string_len: config.max_string_len,
            min_time: config.min_time,
            max_time: config.max_time,
        };
        gen.pool = config
            .pool
            .into_iter()
            .map(|name| {
                let uid = gen.uuid4();
                Arc::new(Group { name, uid })
            })
            .collect();
        Ok(gen)
    }

    pub fn with_seed(seed: u64) -> Result<Self, GenerationError> {
        Self::new(GeneratorConfig {
            seed,
            ..Default::default()
        })
    }

    /// The shared group pool, in configuration order.
    pub fn pool(&self) -> &[Arc<Group>] {
        &self.pool
    }

    pub fn string(&mut self) -> String {
        let len = self.rng.gen_range(1..=self.max_string_len);
        let alphabet = &self.alphabets[self.rng.gen_range(0..self.alphabets.len())];
        let letters = alphabet.letters();
        (0..len)
            .map(|_| letters[self.rng.gen_range(0..letters.len())])
            .collect()
    }

    fn utc_datetime(&mut self) -> DateTime<Utc> {
        let secs = self.rng.gen_range(self.min_time..=self.max_time);
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs)
    }

    pub fn datetime(&mut self) -> Timestamp {
        Timestamp::Aware(self.utc_datetime().fixed_offset())
    }

    /// Same draw as [`Generator::datetime`] without the offset.
    pub fn naive_datetime(&mut self) -> Timestamp {
        Timestamp::Naive(self.utc_datetime().naive_utc())
    }

    pub fn uuid4(&mut self) -> Uid {
        let mut bytes = [0u8; 16];
        self.rng.fill_bytes(&mut bytes);
        Uid(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }

    pub fn user_type(&mut self) -> UserType {
        UserType::ALL[self.rng.gen_range(0..UserType::ALL.len())]
    }

    /// An IPv4 address, standing in for objects with no native encoding.
    pub fn address(&mut self) -> Opaque {
        Opaque::new(Ipv4Addr::from(self.rng.next_u32()))
    }

    pub fn user(&mut self) -> User {
        let name = self.string();
        let active = self.rng.gen_bool(0.5);
        let ctime = self.datetime();
        let display_name = self.string();

        let fresh = Arc::new(Group {
            name: name.clone(),
            uid: self.uuid4(),
        });
        let k = self.rng.gen_range(1..=self.pool.len());
        let mut groups = Vec::with_capacity(k + 1);
        groups.push(fresh);
        groups.extend(self.pool.choose_multiple(&mut self.rng, k).cloned());

        User {
            active,
            ctime,
            display_name,
            groups,
            name,
            score: self.rng.gen::<f64>(),
            kind: self.user_type(),
            uid: self.uuid4(),
        }
    }

    pub fn users(&mut self, count: usize) -> Vec<User> {
        (0..count).map(|_| self.user()).collect()
    }

    fn array(rows: usize, cols: Option<usize>, data: ArrayData) -> Result<NumericArray, GenerationError> {
        NumericArray::new(rows, cols, data).ok_or(GenerationError::NonPositive {
            field: "array dimension",
            value: 0,
        })
    }

    fn elements(rows: usize, cols: Option<usize>) -> Result<usize, GenerationError> {
        if rows == 0 || cols == Some(0) {
            return Err(GenerationError::NonPositive {
                field: "array dimension",
                value: 0,
            });
        }
        let cols = cols.unwrap_or(1);
        rows.checked_mul(cols)
            .ok_or(GenerationError::ArrayTooLarge { rows, cols })
    }

    pub fn bool_array(&mut self, rows: usize, cols: Option<usize>) -> Result<NumericArray, GenerationError> {
        let n = Self::elements(rows, cols)?;
        let data = (0..n).map(|_| self.rng.gen_bool(0.5)).collect();
        Self::array(rows, cols, ArrayData::Bool(data))
    }

    /// Elements span the whole `i32` range.
    pub fn int32_array(&mut self, rows: usize, cols: Option<usize>) -> Result<NumericArray, GenerationError> {
        let n = Self::elements(rows, cols)?;
        let data = (0..n).map(|_| self.rng.gen_range(i32::MIN..=i32::MAX)).collect();
        Self::array(rows, cols, ArrayData::Int32(data))
    }

    /// Elements span the whole `i64` range.
    pub fn int64_array(&mut self, rows: usize, cols: Option<usize>) -> Result<NumericArray, GenerationError> {
        let n = Self::elements(rows, cols)?;
        let data = (0..n).map(|_| self.rng.gen_range(i64::MIN..=i64::MAX)).collect();
        Self::array(rows, cols, ArrayData::Int64(data))
    }

    /// Elements are uniform in `[0, 1)`.
    pub fn float64_array(&mut self, rows: usize, cols: Option<usize>) -> Result<NumericArray, GenerationError> {
        let n = Self::elements(rows, cols)?;
        let data = (0..n).map(|_| self.rng.gen::<f64>()).collect();
        Self::array(rows, cols, ArrayData::Float64(data))
    }

    fn scalars(&mut self, count: usize, mut draw: impl FnMut(&mut Self) -> Record) -> Result<Dataset, GenerationError> {
        Dataset::from_records((0..count).map(|_| draw(self)).collect())
    }

    /// All pack datasets of a session, in catalog order.
    pub fn datasets(&mut self, scale: &Scale) -> Result<Vec<(&'static str, Dataset)>, GenerationError> {
        scale.validate()?;
        let n = scale.record_count;
        let rows = scale.array_element_count;
        let width = scale.array_width;

        let users = self.users(n);
        let mappings = users
            .iter()
            .map(|u| convert::record_to_mapping(&Record::Struct(u.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        let models = mappings
            .iter()
            .map(|m| UserModel::from_mapping(m).map(Record::Model))
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = vec![
            (
                "mapping",
                Dataset::from_records(mappings.into_iter().map(Record::Mapping).collect())?,
            ),
            (
                "struct",
                Dataset::from_records(users.into_iter().map(Record::Struct).collect())?,
            ),
            ("model", Dataset::from_records(models)?),
        ];
        out.push(("datetime", self.scalars(n, |g| Record::Timestamp(g.datetime()))?));
        out.push(("naive datetime", self.scalars(n, |g| Record::Timestamp(g.naive_datetime()))?));
        out.push(("uuid", self.scalars(n, |g| Record::Uuid(g.uuid4()))?));
        out.push(("enum", self.scalars(n, |g| Record::Enum(g.user_type()))?));
        out.push(("opaque", self.scalars(n, |g| Record::Opaque(g.address()))?));
        out.push(("array int32", Dataset::Array(self.int32_array(rows, Some(width))?)));
        out.push(("array int64", Dataset::Array(self.int64_array(rows, None)?)));
        out.push((
            "array float64",
            Dataset::Array(self.float64_array((rows / 2).max(1), Some(width))?),
        ));
        out.push((
            "array bool",
            Dataset::Array(self.bool_array(rows, Some(width.saturating_mul(2)))?),
        ));
        Ok(out)
    }

    /// The full experiment catalog: every dataset as a pack experiment, plus
    /// decoding of the struct dataset.
    pub fn experiments(&mut self, scale: &Scale) -> Result<Vec<Experiment>, GenerationError> {
        let datasets = self.datasets(scale)?;
        let unpack = datasets
            .iter()
            .find(|(name, _)| *name == "struct")
            .map(|(name, data)| Experiment::new(*name, data.clone(), true));
        let mut experiments: Vec<Experiment> = datasets
            .into_iter()
            .map(|(name, data)| Experiment::new(name, data, false))
            .collect();
        experiments.extend(unpack);
        Ok(experiments)
    }
}
