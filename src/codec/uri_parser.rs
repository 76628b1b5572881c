//! `nom`-based parsers for the URI and Address grammars (spec §4.1 "URI
//! parse" / "Address parse").

use std::net::{Ipv4Addr, Ipv6Addr};

use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_until, take_while, take_while1};
use nom::character::complete::{char, digit1, space0};
use nom::combinator::{map, map_res, opt};
use nom::multi::many0;
use nom::sequence::preceded;
use nom::IResult;

use crate::error::{ParseError, ParseErrorKind};
use crate::message::address::Address;
use crate::message::uri::{Host, ParamList, Scheme, Uri};

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '.'
}

fn is_param_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_.!~*'()+`".contains(c)
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-.!%*_+`'~".contains(c)
}

/// Decodes `%XX` escapes. Malformed escapes are passed through verbatim
/// rather than rejected — the codec favors leniency here per spec §4.1.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn scheme(input: &str) -> IResult<&str, Scheme> {
    alt((
        map(tag_no_case("sips"), |_| Scheme::Sips),
        map(tag_no_case("sip"), |_| Scheme::Sip),
        map(tag_no_case("tel"), |_| Scheme::Tel),
    ))(input)
}

fn userinfo(input: &str) -> IResult<&str, (Option<String>, Option<String>)> {
    let (input, user) = take_while1(|c: char| c != ':' && c != '@')(input)?;
    let (input, password) = opt(preceded(char(':'), take_while(|c: char| c != '@')))(input)?;
    let (input, _) = char('@')(input)?;
    Ok((
        input,
        (Some(percent_decode(user)), password.map(percent_decode)),
    ))
}

fn host(input: &str) -> IResult<&str, Host> {
    alt((
        map(
            nom::sequence::delimited(
                char('['),
                take_while1(|c: char| c != ']'),
                char(']'),
            ),
            |s: &str| {
                s.parse::<Ipv6Addr>()
                    .map(Host::V6)
                    .unwrap_or_else(|_| Host::Name(s.to_string()))
            },
        ),
        map(take_while1(is_host_char), |s: &str| {
            s.parse::<Ipv4Addr>()
                .map(Host::V4)
                .unwrap_or_else(|_| Host::Name(s.to_string()))
        }),
    ))(input)
}

fn uri_param(input: &str) -> IResult<&str, (String, Option<String>)> {
    let (input, key) = take_while1(is_param_char)(input)?;
    let (input, value) = opt(preceded(char('='), take_while(is_param_char)))(input)?;
    Ok((
        input,
        (key.to_string(), value.map(|v| percent_decode(v))),
    ))
}

fn uri_header(input: &str) -> IResult<&str, (String, String)> {
    let (input, key) = take_while1(|c: char| c != '=' && c != '&')(input)?;
    let (input, _) = char('=')(input)?;
    let (input, value) = take_while(|c: char| c != '&')(input)?;
    Ok((input, (key.to_string(), percent_decode(value))))
}

fn uri_parser(input: &str) -> IResult<&str, Uri> {
    let (input, scheme) = scheme(input)?;
    let (input, _) = char(':')(input)?;
    let (input, user_pass) = opt(userinfo)(input)?;
    let (user, password) = user_pass.unwrap_or((None, None));
    let (input, host) = host(input)?;
    let (input, port) = opt(preceded(
        char(':'),
        map_res(digit1, |s: &str| s.parse::<u16>()),
    ))(input)?;
    let (input, params) = many0(preceded(char(';'), uri_param))(input)?;
    let (input, headers) =
        opt(preceded(char('?'), nom::multi::separated_list1(char('&'), uri_header)))(input)?;
    Ok((
        input,
        Uri {
            scheme,
            user,
            password,
            host,
            port: port.unwrap_or(0),
            params,
            headers: headers.unwrap_or_default(),
        },
    ))
}

pub fn parse_uri(input: &str) -> Result<Uri, ParseError> {
    let trimmed = input.trim();
    match uri_parser(trimmed) {
        Ok((rest, uri)) if rest.is_empty() => Ok(uri),
        _ => Err(ParseError::new(ParseErrorKind::InvalidUri)),
    }
}

fn quoted_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let mut result = String::new();
    let mut escaped = false;
    let mut end = None;
    for (i, c) in input.char_indices() {
        if escaped {
            result.push(c);
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if c == '"' {
            end = Some(i);
            break;
        }
        result.push(c);
    }
    match end {
        Some(i) => Ok((&input[i + 1..], result)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

fn token_display_name(input: &str) -> IResult<&str, String> {
    let (input, name) = take_while1(is_token_char)(input)?;
    Ok((input, name.to_string()))
}

fn name_addr(input: &str) -> IResult<&str, (Option<String>, Uri)> {
    let (input, display_name) = opt(alt((quoted_string, token_display_name)))(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = char('<')(input)?;
    let (input, uri_str) = take_until(">")(input)?;
    let (input, _) = char('>')(input)?;
    let uri = parse_uri(uri_str).map_err(|_| {
        nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
    })?;
    Ok((input, (display_name, uri)))
}

pub fn parse_address(input: &str) -> Result<Address, ParseError> {
    let trimmed = input.trim();
    if trimmed == "*" {
        return Ok(Address::Wildcard);
    }
    match name_addr(trimmed) {
        Ok((rest, (display_name, uri))) => {
            let rest = rest.trim_start();
            let (_, params): (&str, ParamList) = many0(preceded(char(';'), uri_param))(rest)
                .map_err(|_: nom::Err<nom::error::Error<&str>>| {
                    ParseError::new(ParseErrorKind::InvalidAddress)
                })?;
            Ok(Address::Named {
                display_name,
                uri,
                params,
            })
        }
        Err(_) => {
            // Bare (unbracketed) form: a top-level `;` after the host-port is
            // ambiguous between a URI param and an address param, so it's
            // only accepted when that region is absent (spec §4.1). Anything
            // with params must use `<URI>;params` instead.
            if trimmed.contains(';') {
                return Err(ParseError::new(ParseErrorKind::InvalidAddress));
            }
            let uri = parse_uri(trimmed)?;
            Ok(Address::new(uri))
        }
    }
}
