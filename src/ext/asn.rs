// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Typed coercions from raw ASN.1 TLVs to the concrete shapes used by the
//! attestation extension, plus the context-tag walker for the
//! `AuthorizationList` fields.  The `der` crate caps tag numbers at 30, while
//! KeyMint tags go up to 724, so the identifier octets are read and written
//! by hand here.

use super::errors::{ExtensionParsingError, ExtensionParsingReason};
use der::asn1::{Null, OctetStringRef, SetOfVec, UintRef};
use der::{Decode, Encode, Header, Length, Reader, SliceReader, Tag};
use num_bigint::BigUint;
use std::collections::BTreeSet;

pub(crate) fn type_mismatch(wanted: &str, got: Tag) -> ExtensionParsingError {
    ExtensionParsingError::with_reason(
        format!("expecting {wanted}, got {got}"),
        ExtensionParsingReason::MalformedDer,
    )
}

/// INTEGER, as a machine integer.
pub fn int_from_tlv(tlv: &[u8]) -> Result<i64, ExtensionParsingError> {
    Ok(i64::from_der(tlv)?)
}

/// INTEGER, non-negative and arbitrary precision.
pub fn uint_from_tlv(tlv: &[u8]) -> Result<BigUint, ExtensionParsingError> {
    let x = UintRef::from_der(tlv)?;
    Ok(BigUint::from_bytes_be(x.as_bytes()))
}

/// ENUMERATED, as the raw discriminant.
pub fn enumerated_from_tlv(tlv: &[u8]) -> Result<u32, ExtensionParsingError> {
    let mut reader = SliceReader::new(tlv)?;
    let header = Header::decode(&mut reader)?;
    if header.tag != Tag::Enumerated {
        return Err(type_mismatch("ENUMERATED", header.tag));
    }
    let body = reader.read_slice(header.length)?;
    if body.is_empty() || body.len() > 4 {
        return Err(ExtensionParsingError::with_reason(
            format!("ENUMERATED of {} bytes", body.len()),
            ExtensionParsingReason::MalformedDer,
        ));
    }
    Ok(body.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
}

/// OCTET STRING, as owned bytes.
pub fn octet_string_from_tlv(tlv: &[u8]) -> Result<Vec<u8>, ExtensionParsingError> {
    Ok(OctetStringRef::from_der(tlv)?.as_bytes().to_vec())
}

/// OCTET STRING holding UTF-8 text.  Decoding is strict: malformed bytes are
/// an error, never a replacement character.
pub fn utf8_from_tlv(tlv: &[u8]) -> Result<String, ExtensionParsingError> {
    utf8_from_bytes(OctetStringRef::from_der(tlv)?.as_bytes())
}

/// Strict UTF-8 conversion of already-extracted bytes.
pub fn utf8_from_bytes(bytes: &[u8]) -> Result<String, ExtensionParsingError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| {
        ExtensionParsingError::with_reason(e.to_string(), ExtensionParsingReason::MalformedUtf8)
    })
}

/// Presence-only boolean: NULL and BOOLEAN TRUE both mean "present and
/// true".  An explicit BOOLEAN FALSE must never be emitted by a conformant
/// implementation.
pub fn bool_presence_from_tlv(tlv: &[u8]) -> Result<bool, ExtensionParsingError> {
    let mut reader = SliceReader::new(tlv)?;
    let header = Header::decode(&mut reader)?;
    match header.tag {
        Tag::Null => {
            Null::from_der(tlv)?;
            Ok(true)
        }
        Tag::Boolean => {
            if bool::from_der(tlv)? {
                Ok(true)
            } else {
                Err(ExtensionParsingError::with_reason(
                    "boolean field encoded as FALSE",
                    ExtensionParsingReason::ForbiddenBooleanValue,
                ))
            }
        }
        t => Err(type_mismatch("NULL or BOOLEAN", t)),
    }
}

/// SET OF INTEGER, as an unordered collection.
pub fn int_set_from_tlv(tlv: &[u8]) -> Result<BTreeSet<i64>, ExtensionParsingError> {
    let set = SetOfVec::<i64>::from_der(tlv)?;
    Ok(set.iter().copied().collect())
}

/// Reads one context-specific constructed identifier octet (low or
/// high-tag-number form) off the reader and returns its tag number, or
/// `None` when the reader is exhausted.  Tag numbers above 0x3fff are not
/// representable in the KeyMint schema and are rejected.
pub fn read_context_tag<'a, R: Reader<'a>>(
    reader: &mut R,
) -> Result<Option<u32>, ExtensionParsingError> {
    if reader.remaining_len() == Length::ZERO {
        return Ok(None);
    }
    let b1 = reader.read_byte()?;
    if b1 & 0xc0 != 0x80 {
        return Err(ExtensionParsingError::with_reason(
            format!("expecting context-specific tag, got identifier {b1:#04x}"),
            ExtensionParsingReason::MalformedDer,
        ));
    }
    if b1 & 0x1f != 0x1f {
        return Ok(Some(u32::from(b1 & 0x1f)));
    }
    let b2 = reader.read_byte()?;
    if b2 & 0x80 == 0 {
        return Ok(Some(u32::from(b2)));
    }
    let b3 = reader.read_byte()?;
    if b3 & 0x80 != 0 {
        return Err(ExtensionParsingError::with_reason(
            "tag number exceeds two base-128 digits",
            ExtensionParsingReason::MalformedDer,
        ));
    }
    Ok(Some((u32::from(b2 & 0x7f) << 7) | u32::from(b3)))
}

/// Reads the length that follows a context tag and returns the enclosed
/// bytes (a complete inner TLV under EXPLICIT tagging).
pub fn read_tagged_body<'a, R: Reader<'a>>(
    reader: &mut R,
) -> Result<&'a [u8], ExtensionParsingError> {
    let len = Length::decode(reader)?;
    if reader.remaining_len() < len {
        return Err(ExtensionParsingError::with_reason(
            "context-tagged field overruns its enclosing sequence",
            ExtensionParsingReason::MalformedDer,
        ));
    }
    Ok(reader.read_slice(len)?)
}

/// An EXPLICIT context-tagged value with a tag number the `der` crate cannot
/// express.  The identifier octets are emitted manually; the payload is any
/// encodable value.
pub struct ExplicitTaggedValue<T: Encode> {
    pub tag: u32,
    pub val: T,
}

impl<T: Encode> ExplicitTaggedValue<T> {
    fn tag_len(&self) -> der::Result<Length> {
        match self.tag {
            0..=0x1e => Ok(Length::ONE),
            0x1f..=0x7f => Ok(Length::new(2)),
            0x80..=0x3fff => Ok(Length::new(3)),
            _ => Err(der::ErrorKind::Overflow.into()),
        }
    }

    fn encode_tag(&self, writer: &mut impl der::Writer) -> der::Result<()> {
        // 0b101vvvvv is context-specific + constructed
        match self.tag {
            0..=0x1e => writer.write_byte(0b1010_0000 | (self.tag as u8)),
            0x1f..=0x7f => {
                writer.write_byte(0b1011_1111)?;
                writer.write_byte(self.tag as u8)
            }
            0x80..=0x3fff => {
                writer.write_byte(0b1011_1111)?;
                writer.write_byte((self.tag >> 7) as u8 | 0x80)?;
                writer.write_byte((self.tag & 0x7f) as u8)
            }
            _ => Err(der::ErrorKind::Overflow.into()),
        }
    }
}

impl<T: Encode> Encode for ExplicitTaggedValue<T> {
    fn encoded_len(&self) -> der::Result<Length> {
        let inner_len = self.val.encoded_len()?;
        self.tag_len()? + inner_len.encoded_len()? + inner_len
    }

    fn encode(&self, writer: &mut impl der::Writer) -> der::Result<()> {
        let inner_len = self.val.encoded_len()?;
        self.encode_tag(writer)?;
        inner_len.encode(writer)?;
        self.val.encode(writer)
    }
}

/// Pre-encoded DER, written through verbatim.  Used to splice nested
/// structures (RootOfTrust, application id) into a tagged field.
pub struct RawDer<'a>(pub &'a [u8]);

impl Encode for RawDer<'_> {
    fn encoded_len(&self) -> der::Result<Length> {
        Length::try_from(self.0.len())
    }

    fn encode(&self, writer: &mut impl der::Writer) -> der::Result<()> {
        writer.write(self.0)
    }
}

/// Wraps already-encoded content bytes in a TLV with the given tag.
pub fn encode_tlv(tag: Tag, content: &[u8], out: &mut Vec<u8>) -> der::Result<()> {
    tag.encode(out)?;
    Length::try_from(content.len())?.encode(out)?;
    out.extend_from_slice(content);
    Ok(())
}

/// Emits a SET OF from pre-encoded elements, sorting them into the
/// canonical DER order.
pub fn encode_set_of(mut elements: Vec<Vec<u8>>, out: &mut Vec<u8>) -> der::Result<()> {
    elements.sort();
    let content = elements.concat();
    encode_tlv(Tag::Set, &content, out)
}

/// Emits a SET OF INTEGER from an unordered collection.
pub fn encode_int_set(values: &BTreeSet<i64>, out: &mut Vec<u8>) -> der::Result<()> {
    let mut set = SetOfVec::new();
    for v in values {
        // BTreeSet iteration is ascending, which is also the DER order for
        // same-signed INTEGERs of these magnitudes.
        set.insert_ordered(*v)?;
    }
    set.encode(out)
}

/// Emits an ENUMERATED with a single-octet discriminant.
pub fn encode_enumerated(value: u32, out: &mut Vec<u8>) -> der::Result<()> {
    if value > 0x7f {
        return Err(der::ErrorKind::Overflow.into());
    }
    encode_tlv(Tag::Enumerated, &[value as u8], out)
}

/// Emits a non-negative INTEGER of arbitrary precision.
pub fn encode_uint(value: &BigUint, out: &mut Vec<u8>) -> der::Result<()> {
    let bytes = value.to_bytes_be();
    UintRef::new(&bytes)?.encode(out)
}

/// Splits a SET TLV into the raw TLVs of its elements.
pub fn set_elements_from_tlv(tlv: &[u8]) -> Result<Vec<&[u8]>, ExtensionParsingError> {
    let mut reader = SliceReader::new(tlv)?;
    let header = Header::decode(&mut reader)?;
    if header.tag != Tag::Set {
        return Err(type_mismatch("SET", header.tag));
    }
    let body = reader.read_slice(header.length)?;
    let mut elements = Vec::new();
    let mut reader = SliceReader::new(body)?;
    while !reader.is_finished() {
        elements.push(reader.tlv_bytes()?);
    }
    Ok(elements)
}
