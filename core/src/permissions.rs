//! Hierarchical permission codes and per-user permission bitmaps.
//!
//! A full permission is the decimal code `1_PP_GG_SS`: section `SS`, group
//! `GG` and permission-within-group `PP`, behind a fixed leading `1`. Each
//! field is also used as a bit index, so all three must be below 64.
//!
//! [`UserPermissions`] stores a granted set as a section bitmap plus, per
//! section bit, a map from group index to the bitmap of granted
//! permissions. It serializes as `{"S": <sections>, "P": {"<sBit>": {"<group>": <bitmap>}}}`.
//!
//! # Examples
//!
//! ```
//! use dvc_core::{Permission, UserPermissions};
//!
//! let read = Permission::new(10, 7, 9).unwrap();
//! assert_eq!(read.code(), 1_090_710);
//!
//! let mut perms = UserPermissions::new();
//! perms.add(read);
//! assert!(perms.has(read));
//! assert_eq!(perms.sections(), 1024);
//!
//! perms.remove(read);
//! assert!(!perms.has(read));
//! assert!(perms.is_empty());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed leading digit that keeps every code seven digits wide.
pub const PERMISSION_PREFIX: u32 = 1_000_000;

/// Exclusive upper bound for section, group and permission indices.
pub const MAX_BIT_INDEX: u32 = u64::BITS;

const SECTION_RADIX: u32 = 100;
const GROUP_RADIX: u32 = 10_000;

/// Errors raised while decoding permission codes or bitmaps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    /// The code is not a seven-digit `1_PP_GG_SS` value.
    #[error("malformed permission code: {0}")]
    MalformedCode(u32),
    /// The text is not a number at all.
    #[error("invalid permission code '{0}'")]
    InvalidCode(String),
    #[error("section {0} out of range (must be below 64)")]
    SectionOutOfRange(u32),
    #[error("group {0} out of range (must be below 64)")]
    GroupOutOfRange(u32),
    #[error("permission {0} out of range (must be below 64)")]
    PermOutOfRange(u32),
    /// A stored bitmap breaks the section/group invariant.
    #[error("inconsistent permission bitmap: {0}")]
    InconsistentBitmap(String),
}

/// Builds the raw code for `(section, group, perm)` without range checks.
pub const fn build_perm(section: u32, group: u32, perm: u32) -> u32 {
    PERMISSION_PREFIX + perm * GROUP_RADIX + group * SECTION_RADIX + section
}

/// Section field of a raw code.
pub const fn fetch_section(full: u32) -> u32 {
    full % SECTION_RADIX
}

/// Group field of a raw code.
pub const fn fetch_group(full: u32) -> u32 {
    (full % GROUP_RADIX - fetch_section(full)) / SECTION_RADIX
}

/// Permission-within-group field of a raw code.
pub const fn fetch_base_perm(full: u32) -> u32 {
    (full % PERMISSION_PREFIX) / GROUP_RADIX
}

/// `1 << index`, or `None` when `index` does not fit a 64-bit bitmap.
pub const fn to_bit_position(index: u32) -> Option<u64> {
    1u64.checked_shl(index)
}

/// A validated permission whose fields all fit a 64-bit bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Permission {
    section: u8,
    group: u8,
    perm: u8,
}

impl Permission {
    /// # Errors
    ///
    /// The matching `*OutOfRange` variant when a field is 64 or above.
    pub fn new(section: u32, group: u32, perm: u32) -> Result<Self, PermissionError> {
        Ok(Self {
            section: bit_index(section).ok_or(PermissionError::SectionOutOfRange(section))?,
            group: bit_index(group).ok_or(PermissionError::GroupOutOfRange(group))?,
            perm: bit_index(perm).ok_or(PermissionError::PermOutOfRange(perm))?,
        })
    }

    /// Decodes a full `1_PP_GG_SS` code.
    ///
    /// # Errors
    ///
    /// [`PermissionError::MalformedCode`] when the code is not seven digits
    /// starting with `1`, otherwise the errors of [`Permission::new`].
    pub fn from_code(code: u32) -> Result<Self, PermissionError> {
        if !(PERMISSION_PREFIX..2 * PERMISSION_PREFIX).contains(&code) {
            return Err(PermissionError::MalformedCode(code));
        }
        Self::new(
            fetch_section(code),
            fetch_group(code),
            fetch_base_perm(code),
        )
    }

    pub fn code(self) -> u32 {
        build_perm(
            u32::from(self.section),
            u32::from(self.group),
            u32::from(self.perm),
        )
    }

    pub fn section(self) -> u8 {
        self.section
    }

    pub fn group(self) -> u8 {
        self.group
    }

    pub fn perm(self) -> u8 {
        self.perm
    }

    fn section_bit(self) -> u64 {
        1 << self.section
    }

    fn perm_bit(self) -> u64 {
        1 << self.perm
    }
}

fn bit_index(value: u32) -> Option<u8> {
    if value < MAX_BIT_INDEX {
        u8::try_from(value).ok()
    } else {
        None
    }
}

impl TryFrom<u32> for Permission {
    type Error = PermissionError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<Permission> for u32 {
    fn from(permission: Permission) -> Self {
        permission.code()
    }
}

impl FromStr for Permission {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s
            .trim()
            .replace('_', "")
            .parse::<u32>()
            .map_err(|_| PermissionError::InvalidCode(s.to_string()))?;
        Self::from_code(code)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Set of permissions granted to a user.
///
/// Bit `i` of `sections` is set iff `per_group` holds a non-empty entry
/// under `1 << i`, and every stored group bitmap is non-zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredPermissions")]
pub struct UserPermissions {
    #[serde(rename = "S")]
    sections: u64,
    #[serde(rename = "P")]
    per_group: BTreeMap<u64, BTreeMap<u8, u64>>,
}

impl UserPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from raw codes, failing on the first invalid one.
    ///
    /// # Errors
    ///
    /// The error of [`Permission::from_code`] for the first bad code.
    pub fn from_codes(codes: impl IntoIterator<Item = u32>) -> Result<Self, PermissionError> {
        codes
            .into_iter()
            .map(Permission::from_code)
            .collect::<Result<Self, _>>()
    }

    /// Bitmap of sections with at least one grant.
    pub fn sections(&self) -> u64 {
        self.sections
    }

    /// Group bitmaps keyed by section bit, then group index.
    pub fn per_group(&self) -> &BTreeMap<u64, BTreeMap<u8, u64>> {
        &self.per_group
    }

    /// Granted permission bitmap for `(section, group)`, 0 when none.
    pub fn group_bitmap(&self, section: u8, group: u8) -> u64 {
        to_bit_position(u32::from(section))
            .and_then(|section_bit| self.per_group.get(&section_bit))
            .and_then(|groups| groups.get(&group))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.sections == 0
    }

    /// Grants `permission`. Returns `true` if it was not already granted.
    pub fn add(&mut self, permission: Permission) -> bool {
        let section_bit = permission.section_bit();
        let perm_bit = permission.perm_bit();
        self.sections |= section_bit;
        let bitmap = self
            .per_group
            .entry(section_bit)
            .or_default()
            .entry(permission.group)
            .or_default();
        let added = *bitmap & perm_bit == 0;
        *bitmap |= perm_bit;
        added
    }

    /// Grants every permission in `permissions`.
    pub fn add_all(&mut self, permissions: impl IntoIterator<Item = Permission>) {
        for permission in permissions {
            self.add(permission);
        }
    }

    /// Revokes `permission`. Returns `true` if it was granted.
    ///
    /// Empty group bitmaps are dropped, and the section bit is cleared once
    /// no group under it has a grant left.
    pub fn remove(&mut self, permission: Permission) -> bool {
        let section_bit = permission.section_bit();
        let perm_bit = permission.perm_bit();
        let Some(groups) = self.per_group.get_mut(&section_bit) else {
            return false;
        };
        let Some(bitmap) = groups.get_mut(&permission.group) else {
            return false;
        };
        if *bitmap & perm_bit == 0 {
            return false;
        }

        *bitmap &= !perm_bit;
        if *bitmap == 0 {
            groups.remove(&permission.group);
        }
        if groups.is_empty() {
            self.per_group.remove(&section_bit);
            self.sections &= !section_bit;
        }
        true
    }

    /// Returns `true` if `permission` is granted.
    pub fn has(&self, permission: Permission) -> bool {
        let section_bit = permission.section_bit();
        let perm_bit = permission.perm_bit();
        self.sections & section_bit == section_bit
            && self
                .per_group
                .get(&section_bit)
                .and_then(|groups| groups.get(&permission.group))
                .is_some_and(|bitmap| bitmap & perm_bit == perm_bit)
    }

    /// Granted permissions in ascending `(section, group, perm)` order.
    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.per_group.iter().flat_map(|(&section_bit, groups)| {
            let section = section_bit.trailing_zeros() as u8;
            groups.iter().flat_map(move |(&group, &bitmap)| {
                (0..u64::BITS as u8)
                    .filter(move |perm| bitmap & (1 << perm) != 0)
                    .map(move |perm| Permission {
                        section,
                        group,
                        perm,
                    })
            })
        })
    }
}

impl FromIterator<Permission> for UserPermissions {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut permissions = Self::new();
        permissions.add_all(iter);
        permissions
    }
}

impl Extend<Permission> for UserPermissions {
    fn extend<I: IntoIterator<Item = Permission>>(&mut self, iter: I) {
        self.add_all(iter);
    }
}

/// Wire form of [`UserPermissions`], checked before it is accepted.
#[derive(Deserialize)]
struct StoredPermissions {
    #[serde(rename = "S")]
    sections: u64,
    #[serde(rename = "P", default)]
    per_group: BTreeMap<u64, BTreeMap<u8, u64>>,
}

impl TryFrom<StoredPermissions> for UserPermissions {
    type Error = PermissionError;

    fn try_from(stored: StoredPermissions) -> Result<Self, Self::Error> {
        let mut sections = 0u64;
        for (&section_bit, groups) in &stored.per_group {
            if section_bit.count_ones() != 1 {
                return Err(PermissionError::InconsistentBitmap(format!(
                    "section key {section_bit} is not a single bit"
                )));
            }
            if groups.is_empty() {
                return Err(PermissionError::InconsistentBitmap(format!(
                    "section key {section_bit} has no groups"
                )));
            }
            for (&group, &bitmap) in groups {
                if u32::from(group) >= MAX_BIT_INDEX {
                    return Err(PermissionError::GroupOutOfRange(u32::from(group)));
                }
                if bitmap == 0 {
                    return Err(PermissionError::InconsistentBitmap(format!(
                        "group {group} under section key {section_bit} is empty"
                    )));
                }
            }
            sections |= section_bit;
        }
        if sections != stored.sections {
            return Err(PermissionError::InconsistentBitmap(format!(
                "sections {} do not match stored groups {sections}",
                stored.sections
            )));
        }
        Ok(Self {
            sections,
            per_group: stored.per_group,
        })
    }
}
