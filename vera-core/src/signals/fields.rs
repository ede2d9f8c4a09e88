//! Field grammar of the DBC dialect
//!
//! Every field of a record has its own `nom` combinator. A record is first
//! split into fields, then each field runs through its combinator, so that a
//! malformed field is reported with the exact shape that was expected for it.

use crate::signals::database::{Endianness, Node, Signal};
use crate::signals::dbc::SIGNAL_KEYWORD;
use crate::types::{ParseError, ParseErrorKind};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_till1},
    character::complete::{self, char, hex_digit1, multispace0},
    combinator::{all_consuming, map_res, opt, recognize, value},
    multi::{many0, many1, separated_list1},
    number::complete::float,
    sequence::{delimited, preceded, separated_pair, terminated},
    IResult,
};

type Res<'a, T> = IResult<&'a str, T>;

/// Bit layout read from a `<start>|<length>@<order><sign>[(<int>,<dec>)]` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitWindow {
    pub start_bit: u8,
    pub length: u8,
    pub endianness: Endianness,
    pub signed: bool,
    pub integer_figures: u8,
    pub decimal_figures: u8,
}

fn is_quote(chr: char) -> bool {
    chr == '"'
}

fn is_comma(chr: char) -> bool {
    chr == ','
}

fn is_colon(chr: char) -> bool {
    chr == ':'
}

fn is_at(chr: char) -> bool {
    chr == '@'
}

fn is_field_break(chr: char) -> bool {
    chr.is_whitespace() || chr == '"'
}

fn colon(s: &str) -> Res<'_, char> {
    char(':')(s)
}

fn pipe(s: &str) -> Res<'_, char> {
    char('|')(s)
}

fn at(s: &str) -> Res<'_, char> {
    char('@')(s)
}

fn comma(s: &str) -> Res<'_, char> {
    char(',')(s)
}

fn dec_u8(s: &str) -> Res<'_, u8> {
    complete::u8(s)
}

/// Double-quoted text; the quotes are dropped
pub(crate) fn char_string(s: &str) -> Res<'_, &str> {
    delimited(char('"'), take_till(is_quote), char('"'))(s)
}

/// One whitespace-separated field; quoted text stays in one field
fn field(s: &str) -> Res<'_, &str> {
    recognize(many1(alt((
        recognize(char_string),
        recognize(preceded(char('"'), take_till(is_quote))),
        take_till1(is_field_break),
    ))))(s)
}

/// Split a record into fields
pub(crate) fn split_fields(text: &str) -> Vec<&str> {
    match preceded(multispace0, many0(terminated(field, multispace0)))(text) {
        Ok((_, fields)) => fields,
        Err(_) => Vec::new(),
    }
}

fn hex_u32(s: &str) -> Res<'_, u32> {
    map_res(hex_digit1, |digits: &str| u32::from_str_radix(digits, 16))(s)
}

/// `<id>` in base 10 or `0x`-prefixed hexadecimal
pub(crate) fn message_id(s: &str) -> Res<'_, u32> {
    alt((preceded(alt((tag("0x"), tag("0X"))), hex_u32), complete::u32))(s)
}

/// `<MessageName>:`
pub(crate) fn message_name(s: &str) -> Res<'_, &str> {
    terminated(take_till(is_colon), colon)(s)
}

pub(crate) fn message_dlc(s: &str) -> Res<'_, u8> {
    dec_u8(s)
}

/// `<StartBit>|<Length>@`, up to and including the `@`
fn bit_position(s: &str) -> Res<'_, &str> {
    terminated(take_till(is_at), at)(s)
}

fn byte_order(s: &str) -> Res<'_, Endianness> {
    alt((
        value(Endianness::Little, char('0')),
        value(Endianness::Big, char('1')),
    ))(s)
}

/// `+` unsigned, `-` signed
fn value_type(s: &str) -> Res<'_, bool> {
    alt((value(false, char('+')), value(true, char('-'))))(s)
}

/// `(<IntegerFigures>,<DecimalFigures>)`
fn figures(s: &str) -> Res<'_, (u8, u8)> {
    delimited(char('('), separated_pair(dec_u8, comma, dec_u8), char(')'))(s)
}

fn brc_open(s: &str) -> Res<'_, char> {
    char('(')(s)
}

fn brk_open(s: &str) -> Res<'_, char> {
    char('[')(s)
}

/// `<Factor>,`
fn factor(s: &str) -> Res<'_, f32> {
    terminated(float, comma)(s)
}

/// `<Offset>)`
fn offset(s: &str) -> Res<'_, f32> {
    terminated(float, char(')'))(s)
}

/// `<Min>|`
fn min(s: &str) -> Res<'_, f32> {
    terminated(float, pipe)(s)
}

/// `<Max>]`
fn max(s: &str) -> Res<'_, f32> {
    terminated(float, char(']'))(s)
}

fn receiver(s: &str) -> Res<'_, &str> {
    take_till1(is_comma)(s)
}

fn receivers(s: &str) -> Res<'_, Vec<&str>> {
    separated_list1(comma, receiver)(s)
}

/// Text of the piece a combinator stopped on, up to the next `stop`
fn piece(s: &str, stop: char) -> String {
    s.split(stop).next().unwrap_or(s).to_string()
}

fn first_char(s: &str) -> String {
    s.chars().next().map(String::from).unwrap_or_default()
}

/// Parse one `SG_` line (leading indentation already removed)
pub fn parse_signal_line(text: &str, line: usize) -> Result<Signal, ParseError> {
    let err = |kind| ParseError::new(line, kind);

    let fields = split_fields(text);
    if fields.first() != Some(&SIGNAL_KEYWORD) {
        return Err(err(ParseErrorKind::Keyword {
            expected: SIGNAL_KEYWORD,
            found: fields.first().unwrap_or(&"").to_string(),
        }));
    }
    if fields.len() < 8 {
        return Err(err(ParseErrorKind::SignalStructure {
            found: fields.len(),
        }));
    }
    if fields[2] != ":" {
        return Err(err(ParseErrorKind::SignalColon(fields[2].to_string())));
    }

    let window = parse_bit_window(fields[3]).map_err(err)?;
    let (factor, offset) = parse_factor_offset(fields[4]).map_err(err)?;
    let (min, max) = parse_min_max(fields[5]).map_err(err)?;
    let unit = parse_unit(fields[6]).map_err(err)?;
    let receivers = parse_receivers(&fields[7..]).map_err(err)?;

    Ok(Signal {
        name: fields[1].to_string(),
        start_bit: window.start_bit,
        length: window.length,
        endianness: window.endianness,
        signed: window.signed,
        integer_figures: window.integer_figures,
        decimal_figures: window.decimal_figures,
        factor,
        offset,
        min,
        max,
        unit: unit.to_string(),
        receivers,
        topic: String::new(),
        line,
    })
}

/// Parse the bit window field, e.g. `0|16@1+` or `8|8@0-(4,4)`
pub fn parse_bit_window(token: &str) -> Result<BitWindow, ParseErrorKind> {
    let (format, position) =
        bit_position(token).map_err(|_| ParseErrorKind::BitInfo(token.to_string()))?;

    let (s, start_bit) =
        dec_u8(position).map_err(|_| ParseErrorKind::StartBit(piece(position, '|')))?;
    let (s, _) =
        pipe(s).map_err(|_| ParseErrorKind::StartBitAndLength(position.to_string()))?;
    let (_, length) =
        all_consuming(dec_u8)(s).map_err(|_| ParseErrorKind::Length(s.to_string()))?;

    if format.chars().count() < 2 {
        return Err(ParseErrorKind::OrderAndSign(format.to_string()));
    }
    let (s, endianness) =
        byte_order(format).map_err(|_| ParseErrorKind::BitOrder(first_char(format)))?;
    let (s, signed) = value_type(s).map_err(|_| ParseErrorKind::Sign(first_char(s)))?;
    let (_, figures) =
        all_consuming(opt(figures))(s).map_err(|_| ParseErrorKind::Figures(s.to_string()))?;
    let (integer_figures, decimal_figures) = figures.unwrap_or((0, 0));

    Ok(BitWindow {
        start_bit,
        length,
        endianness,
        signed,
        integer_figures,
        decimal_figures,
    })
}

/// Parse `(<Factor>,<Offset>)`
pub fn parse_factor_offset(token: &str) -> Result<(f32, f32), ParseErrorKind> {
    let invalid = || ParseErrorKind::FactorOffset(token.to_string());
    if !token.contains(',') || !token.ends_with(')') {
        return Err(invalid());
    }

    let (s, _) = brc_open(token).map_err(|_| invalid())?;
    let (s, factor) = factor(s).map_err(|_| ParseErrorKind::Factor(piece(s, ',')))?;
    let (_, offset) =
        all_consuming(offset)(s).map_err(|_| ParseErrorKind::Offset(piece(s, ')')))?;
    Ok((factor, offset))
}

/// Parse `[<Min>|<Max>]`
pub fn parse_min_max(token: &str) -> Result<(f32, f32), ParseErrorKind> {
    let invalid = || ParseErrorKind::MinMax(token.to_string());
    if !token.contains('|') || !token.ends_with(']') {
        return Err(invalid());
    }

    let (s, _) = brk_open(token).map_err(|_| invalid())?;
    let (s, min) = min(s).map_err(|_| ParseErrorKind::Min(piece(s, '|')))?;
    let (_, max) = all_consuming(max)(s).map_err(|_| ParseErrorKind::Max(piece(s, ']')))?;
    Ok((min, max))
}

/// Parse a double-quoted unit; the quotes are dropped
pub fn parse_unit(token: &str) -> Result<&str, ParseErrorKind> {
    all_consuming(char_string)(token)
        .map(|(_, unit)| unit)
        .map_err(|_| ParseErrorKind::Unit(token.to_string()))
}

/// Parse the comma-separated receiver list
///
/// The list normally is one field, but `A, B` style spacing is tolerated by
/// joining the remaining fields first.
pub fn parse_receivers(fields: &[&str]) -> Result<Vec<Node>, ParseErrorKind> {
    let joined = fields.concat();
    let result = match all_consuming(receivers)(joined.as_str()) {
        Ok((_, names)) => Ok(names.into_iter().map(Node::from).collect()),
        Err(_) => Err(ParseErrorKind::Receivers(joined.clone())),
    };
    result
}
