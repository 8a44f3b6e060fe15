use crate::error::{Error, Result};
use rfbridge_core::constants::{MAX_PULSE_MICROS, MAX_TRAIN_PULSES};
use serde::{Deserialize, Serialize};

/// Accepted duration window for one template slot, in microseconds.
///
/// `nominal` is the duration a clean transmitter produces and is what
/// `encode` emits; `min`/`max` bound what `decode` accepts. Serialized as
/// the compact triple `[min, nominal, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[u32; 3]", into = "[u32; 3]")]
pub struct DurationRange {
    min: u32,
    nominal: u32,
    max: u32,
}

impl DurationRange {
    /// Create a range with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidRange` unless `0 < min <= nominal <= max`
    /// and `max` stays within the pulse plausibility bound.
    pub fn new(min: u32, nominal: u32, max: u32) -> Result<Self> {
        if min == 0 || min > nominal || nominal > max || max > MAX_PULSE_MICROS as u32 {
            return Err(Error::InvalidRange { min, nominal, max });
        }
        Ok(DurationRange { min, nominal, max })
    }

    /// Create a symmetric range around `nominal` with a percentage tolerance.
    ///
    /// # Errors
    /// Returns `Error::InvalidRange` when `percent >= 100` (the lower bound
    /// would collapse to zero) or the bounds leave the plausible window.
    pub fn with_tolerance(nominal: u32, percent: u32) -> Result<Self> {
        if percent >= 100 {
            return Err(Error::InvalidRange {
                min: 0,
                nominal,
                max: nominal,
            });
        }
        let delta = nominal * percent / 100;
        DurationRange::new(nominal - delta, nominal, nominal + delta)
    }

    #[must_use]
    pub fn min(&self) -> u32 {
        self.min
    }

    #[must_use]
    pub fn nominal(&self) -> u32 {
        self.nominal
    }

    #[must_use]
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Whether an observed duration falls inside the window.
    #[must_use]
    pub fn contains(&self, observed: f64) -> bool {
        observed >= self.min as f64 && observed <= self.max as f64
    }

    /// Relative deviation of an observed duration from nominal, normalized
    /// by the window half-width on the relevant side. 0.0 on the nominal,
    /// 1.0 on either bound.
    #[must_use]
    pub fn deviation(&self, observed: f64) -> f64 {
        let nominal = self.nominal as f64;
        let width = if observed < nominal {
            nominal - self.min as f64
        } else {
            self.max as f64 - nominal
        };
        if width == 0.0 {
            return if observed == nominal { 0.0 } else { 1.0 };
        }
        ((observed - nominal).abs() / width).min(1.0)
    }
}

impl TryFrom<[u32; 3]> for DurationRange {
    type Error = Error;

    fn try_from(raw: [u32; 3]) -> Result<Self> {
        DurationRange::new(raw[0], raw[1], raw[2])
    }
}

impl From<DurationRange> for [u32; 3] {
    fn from(range: DurationRange) -> [u32; 3] {
        [range.min, range.nominal, range.max]
    }
}

/// One position in a protocol's pulse template.
///
/// A slot matches exactly one pulse. Fixed-role slots carry a single
/// window; a bit slot carries one window per bit value and names the data
/// bit it encodes. Protocols that spread one bit over several pulses
/// (PWM, Manchester) declare several slots with the same `bit` index; all
/// of them must agree on the decoded value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Slot {
    Sync { range: DurationRange },
    Separator { range: DurationRange },
    Footer { range: DurationRange },
    Bit {
        bit: usize,
        zero: DurationRange,
        one: DurationRange,
    },
}

/// Bit significance when assembling field values from the bit buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitOrder {
    /// First bit of a field range is its most significant bit.
    #[default]
    MsbFirst,
    /// First bit of a field range is its least significant bit.
    LsbFirst,
}

/// How observed durations relate to the template's windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingMode {
    /// Windows are absolute microsecond values.
    #[default]
    Absolute,
    /// Windows scale by the ratio of the observed sync pulse to its
    /// nominal value, absorbing transmitter clock drift. The sync pulse
    /// itself must still sit inside its absolute window.
    RelativeToSync,
}

/// One named symbol of an enum field and the bit pattern encoding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumVariant {
    pub symbol: String,
    pub pattern: u64,
}

/// Interpretation of a field's bit range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Unsigned,
    Boolean,
    Enum { variants: Vec<EnumVariant> },
}

/// A named bit range of a protocol's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub offset: usize,
    pub width: usize,
    pub kind: FieldKind,
}

/// Immutable descriptor of one 433MHz device protocol.
///
/// Describes how a device family lays data out as pulse timings: the slot
/// template, the payload bit length, the field layout over those bits, bit
/// order and timing mode. Built through [`ProtocolDefinition::builder`] or
/// deserialized from a catalog file; either way
/// [`validate`](ProtocolDefinition::validate) must pass before the
/// definition enters a registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDefinition {
    id: String,
    template: Vec<Slot>,
    bit_length: usize,
    fields: Vec<FieldDef>,
    #[serde(default)]
    bit_order: BitOrder,
    #[serde(default)]
    timing: TimingMode,
}

impl ProtocolDefinition {
    /// Start building a definition with the given id.
    pub fn builder(id: impl Into<String>) -> ProtocolBuilder {
        ProtocolBuilder::new(id)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn template(&self) -> &[Slot] {
        &self.template
    }

    #[must_use]
    pub fn bit_length(&self) -> usize {
        self.bit_length
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    #[must_use]
    pub fn bit_order(&self) -> BitOrder {
        self.bit_order
    }

    #[must_use]
    pub fn timing(&self) -> TimingMode {
        self.timing
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// First sync slot of the template, with its position.
    #[must_use]
    pub(crate) fn first_sync(&self) -> Option<(usize, DurationRange)> {
        self.template.iter().enumerate().find_map(|(i, slot)| match slot {
            Slot::Sync { range } => Some((i, *range)),
            _ => None,
        })
    }

    /// Check every structural rule a usable definition must satisfy.
    ///
    /// The builder calls this on `build()`; the registry calls it again on
    /// `register()` so definitions arriving through deserialization get the
    /// same scrutiny.
    ///
    /// # Errors
    /// Returns `Error::InvalidDefinition` naming the first rule violated.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(Error::invalid_definition(&self.id, reason));

        if self.id.trim().is_empty() {
            return fail("blank id".into());
        }
        if self.template.is_empty() {
            return fail("empty slot template".into());
        }
        if self.template.len() > MAX_TRAIN_PULSES {
            return fail(format!(
                "template has {} slots, firmware buffer holds {}",
                self.template.len(),
                MAX_TRAIN_PULSES
            ));
        }
        if self.bit_length == 0 {
            return fail("zero bit length".into());
        }

        let mut covered = vec![false; self.bit_length];
        for (index, slot) in self.template.iter().enumerate() {
            if let Slot::Bit { bit, zero, one } = slot {
                if *bit >= self.bit_length {
                    return fail(format!(
                        "slot {index} references bit {bit} beyond bit length {}",
                        self.bit_length
                    ));
                }
                if zero.max() >= one.min() && one.max() >= zero.min() {
                    return fail(format!("slot {index} zero/one windows overlap"));
                }
                covered[*bit] = true;
            }
        }
        if let Some(bit) = covered.iter().position(|c| !c) {
            return fail(format!("bit {bit} is not covered by any slot"));
        }

        if self.timing == TimingMode::RelativeToSync && self.first_sync().is_none() {
            return fail("relative timing requires a sync slot".into());
        }

        for (i, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return fail(format!("field {i} has a blank name"));
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return fail(format!("duplicate field name '{}'", field.name));
            }
            if field.width == 0 {
                return fail(format!("field '{}' has zero width", field.name));
            }
            if field.width > 64 {
                return fail(format!("field '{}' is wider than 64 bits", field.name));
            }
            match field.offset.checked_add(field.width) {
                Some(end) if end <= self.bit_length => {}
                _ => {
                    return fail(format!(
                        "field '{}' overruns the {}-bit payload",
                        field.name, self.bit_length
                    ));
                }
            }
            for other in &self.fields[..i] {
                let disjoint =
                    field.offset >= other.offset + other.width || other.offset >= field.offset + field.width;
                if !disjoint {
                    return fail(format!(
                        "fields '{}' and '{}' overlap",
                        other.name, field.name
                    ));
                }
            }
            match &field.kind {
                FieldKind::Boolean if field.width != 1 => {
                    return fail(format!("boolean field '{}' must be 1 bit wide", field.name));
                }
                FieldKind::Enum { variants } => {
                    if variants.is_empty() {
                        return fail(format!("enum field '{}' has no variants", field.name));
                    }
                    let limit = if field.width == 64 {
                        u64::MAX
                    } else {
                        (1u64 << field.width) - 1
                    };
                    for (j, variant) in variants.iter().enumerate() {
                        if variant.pattern > limit {
                            return fail(format!(
                                "variant '{}' of field '{}' does not fit {} bits",
                                variant.symbol, field.name, field.width
                            ));
                        }
                        if variants[..j].iter().any(|v| v.symbol == variant.symbol) {
                            return fail(format!(
                                "enum field '{}' repeats symbol '{}'",
                                field.name, variant.symbol
                            ));
                        }
                        if variants[..j].iter().any(|v| v.pattern == variant.pattern) {
                            return fail(format!(
                                "enum field '{}' repeats pattern {}",
                                field.name, variant.pattern
                            ));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Builder for [`ProtocolDefinition`] with a fluent API.
///
/// # Example
/// ```
/// use rfbridge_pulse::{DurationRange, ProtocolDefinition};
///
/// let short = DurationRange::with_tolerance(350, 25).unwrap();
/// let long = DurationRange::with_tolerance(1050, 25).unwrap();
///
/// let definition = ProtocolDefinition::builder("demo")
///     .bits(1)
///     .sync(DurationRange::new(250, 350, 450).unwrap())
///     .bit(0, short, long)
///     .field_boolean("on", 0)
///     .build()
///     .unwrap();
///
/// assert_eq!(definition.id(), "demo");
/// ```
pub struct ProtocolBuilder {
    id: String,
    template: Vec<Slot>,
    bit_length: usize,
    fields: Vec<FieldDef>,
    bit_order: BitOrder,
    timing: TimingMode,
}

impl ProtocolBuilder {
    fn new(id: impl Into<String>) -> Self {
        ProtocolBuilder {
            id: id.into(),
            template: Vec::new(),
            bit_length: 0,
            fields: Vec::new(),
            bit_order: BitOrder::MsbFirst,
            timing: TimingMode::Absolute,
        }
    }

    /// Declare the payload bit length.
    pub fn bits(mut self, bit_length: usize) -> Self {
        self.bit_length = bit_length;
        self
    }

    /// Append a sync slot.
    pub fn sync(mut self, range: DurationRange) -> Self {
        self.template.push(Slot::Sync { range });
        self
    }

    /// Append a separator slot.
    pub fn separator(mut self, range: DurationRange) -> Self {
        self.template.push(Slot::Separator { range });
        self
    }

    /// Append a footer slot.
    pub fn footer(mut self, range: DurationRange) -> Self {
        self.template.push(Slot::Footer { range });
        self
    }

    /// Append a bit slot for payload bit `bit`.
    pub fn bit(mut self, bit: usize, zero: DurationRange, one: DurationRange) -> Self {
        self.template.push(Slot::Bit { bit, zero, one });
        self
    }

    /// Declare an unsigned field over `width` bits starting at `offset`.
    pub fn field_unsigned(mut self, name: impl Into<String>, offset: usize, width: usize) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            offset,
            width,
            kind: FieldKind::Unsigned,
        });
        self
    }

    /// Declare a single-bit boolean field at `offset`.
    pub fn field_boolean(mut self, name: impl Into<String>, offset: usize) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            offset,
            width: 1,
            kind: FieldKind::Boolean,
        });
        self
    }

    /// Declare an enum field with named bit patterns.
    pub fn field_enum(
        mut self,
        name: impl Into<String>,
        offset: usize,
        width: usize,
        variants: Vec<(impl Into<String>, u64)>,
    ) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            offset,
            width,
            kind: FieldKind::Enum {
                variants: variants
                    .into_iter()
                    .map(|(symbol, pattern)| EnumVariant {
                        symbol: symbol.into(),
                        pattern,
                    })
                    .collect(),
            },
        });
        self
    }

    /// Assemble fields least-significant-bit first.
    pub fn lsb_first(mut self) -> Self {
        self.bit_order = BitOrder::LsbFirst;
        self
    }

    /// Scale decode windows by the observed sync pulse.
    pub fn relative_timing(mut self) -> Self {
        self.timing = TimingMode::RelativeToSync;
        self
    }

    /// Build and validate the definition.
    ///
    /// # Errors
    /// Returns `Error::InvalidDefinition` when any structural rule fails;
    /// see [`ProtocolDefinition::validate`].
    pub fn build(self) -> Result<ProtocolDefinition> {
        let definition = ProtocolDefinition {
            id: self.id,
            template: self.template,
            bit_length: self.bit_length,
            fields: self.fields,
            bit_order: self.bit_order,
            timing: self.timing,
        };
        definition.validate()?;
        Ok(definition)
    }
}
