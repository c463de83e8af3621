//! Session text codec.
//!
//! Bidirectional conversion between the wire text of a protocol and the
//! [`Session`] model, plus the role-mirroring transform that derives the
//! client's view from a protocol declared from the server's
//! perspective.
//!
//! # Wire grammar
//!
//! ```text
//! session   := "Session: " node
//! node      := single | choice | def | ref | "End"
//! single    := "Single, Dir: " dir ", Payload: " payloadtype ", Cont: " session
//! choice    := "Choice, Dir: " dir ", Alternatives: [" alt ("," alt)* "]"
//! alt       := "(Label: " label ", Session: " node ")"
//! def       := "Def, Name: " name ", Cont: " session
//! ref       := "Ref, Name: " name
//! dir       := "send" | "recv"
//! ```
//!
//! Note the asymmetry: a continuation carries the `"Session: "` prefix,
//! a choice alternative does not.
//!
//! [`decode`] and [`encode`] are exact inverses for any graph built
//! programmatically. Role-mirrored graphs ([`decode_for_role`]) are not
//! expected to round-trip, since mirroring rewrites names and loses the
//! declared directions.

use crate::error::{Result, StpError};
use crate::schema::parse_type_prefix;

use super::{Direction, Label, Role, Session};

/// Decode session text into a [`Session`] graph.
///
/// The whole input must be consumed; any deviation from the grammar
/// fails with a syntax error naming the offending fragment, never a
/// partially built graph.
pub fn decode(text: &str) -> Result<Session> {
    let (session, rest) = parse_session(text)?;
    if !rest.trim().is_empty() {
        return Err(syntax(rest));
    }
    Ok(session)
}

/// Decode session text as one party's view of the protocol.
///
/// Every `Def` and `Ref` name is suffixed with the role (`A` becomes
/// `A_server` / `A_client`) so the two views never collide in the
/// registry, and every `Single` direction is mirrored: the server view
/// keeps the declared direction, the client view flips it. This yields
/// the receiver's view without the sender transmitting two grammars.
pub fn decode_for_role(text: &str, role: Role) -> Result<Session> {
    Ok(apply_role(decode(text)?, role))
}

/// Encode a [`Session`] graph into its wire text.
///
/// Inverse of [`decode`]: `decode(&encode(s)) == Ok(s)` for every
/// graph.
pub fn encode(session: &Session) -> String {
    format!("Session: {}", encode_node(session))
}

fn apply_role(session: Session, role: Role) -> Session {
    match session {
        Session::Single { dir, payload, cont } => Session::Single {
            dir: match role {
                Role::Server => dir,
                Role::Client => dir.flipped(),
            },
            payload,
            cont: Box::new(apply_role(*cont, role)),
        },
        // The choice direction is left as declared; the mediator never
        // consults it (the client always drives the selection).
        Session::Choice { dir, alternatives } => Session::Choice {
            dir,
            alternatives: alternatives
                .into_iter()
                .map(|(label, alt)| (label, apply_role(alt, role)))
                .collect(),
        },
        Session::Def { name, cont } => Session::Def {
            name: format!("{name}_{role}"),
            cont: Box::new(apply_role(*cont, role)),
        },
        Session::Ref { name } => Session::Ref {
            name: format!("{name}_{role}"),
        },
        Session::End => Session::End,
    }
}

fn syntax(rest: &str) -> StpError {
    StpError::Syntax(rest.chars().take(40).collect())
}

fn expect<'a>(input: &'a str, token: &str) -> Result<&'a str> {
    input.strip_prefix(token).ok_or_else(|| syntax(input))
}

fn parse_dir(input: &str) -> Result<(Direction, &str)> {
    if let Some(rest) = input.strip_prefix("send") {
        Ok((Direction::Send, rest))
    } else if let Some(rest) = input.strip_prefix("recv") {
        Ok((Direction::Recv, rest))
    } else {
        Err(syntax(input))
    }
}

/// A protocol or label name: everything up to the next delimiter the
/// enclosing production owns.
fn parse_name(input: &str) -> (&str, &str) {
    let end = input
        .find(|c| matches!(c, ',' | ')' | ']'))
        .unwrap_or(input.len());
    (input[..end].trim(), &input[end..])
}

fn parse_session(input: &str) -> Result<(Session, &str)> {
    let rest = expect(input, "Session: ")?;
    parse_node(rest)
}

fn parse_node(input: &str) -> Result<(Session, &str)> {
    if let Some(rest) = input.strip_prefix("Single, Dir: ") {
        let (dir, rest) = parse_dir(rest)?;
        let rest = expect(rest, ", Payload: ")?;
        let (payload, rest) = parse_type_prefix(rest)?;
        let rest = expect(rest, ", Cont: ")?;
        let (cont, rest) = parse_session(rest)?;
        Ok((
            Session::Single {
                dir,
                payload,
                cont: Box::new(cont),
            },
            rest,
        ))
    } else if let Some(rest) = input.strip_prefix("Choice, Dir: ") {
        let (dir, rest) = parse_dir(rest)?;
        let rest = expect(rest, ", Alternatives: [")?;
        let (alternatives, rest) = parse_alternatives(rest)?;
        Ok((Session::Choice { dir, alternatives }, rest))
    } else if let Some(rest) = input.strip_prefix("Def, Name: ") {
        let end = rest.find(", Cont: ").ok_or_else(|| syntax(rest))?;
        let name = rest[..end].trim();
        if name.is_empty() {
            return Err(syntax(rest));
        }
        let (cont, rest) = parse_session(&rest[end + ", Cont: ".len()..])?;
        Ok((
            Session::Def {
                name: name.to_string(),
                cont: Box::new(cont),
            },
            rest,
        ))
    } else if let Some(rest) = input.strip_prefix("Ref, Name: ") {
        let (name, rest) = parse_name(rest);
        if name.is_empty() {
            return Err(syntax(input));
        }
        Ok((
            Session::Ref {
                name: name.to_string(),
            },
            rest,
        ))
    } else if let Some(rest) = input.strip_prefix("End") {
        Ok((Session::End, rest))
    } else {
        Err(syntax(input))
    }
}

fn parse_alternatives(input: &str) -> Result<(Vec<(Label, Session)>, &str)> {
    let mut alternatives: Vec<(Label, Session)> = Vec::new();
    let mut rest = input;
    loop {
        rest = expect(rest, "(Label: ")?;
        let (label, after) = parse_name(rest);
        if label.is_empty() {
            return Err(syntax(rest));
        }
        rest = expect(after, ", Session: ")?;
        let (alt, after) = parse_node(rest)?;
        rest = expect(after, ")")?;
        alternatives.push((Label::new(label), alt));

        if let Some(after) = rest.strip_prefix(']') {
            return Ok((alternatives, after));
        }
        rest = expect(rest, ",")?;
        rest = rest.strip_prefix(' ').unwrap_or(rest);
    }
}

fn encode_node(session: &Session) -> String {
    match session {
        Session::Single { dir, payload, cont } => {
            format!("Single, Dir: {dir}, Payload: {payload}, Cont: {}", encode(cont))
        }
        Session::Choice { dir, alternatives } => {
            let alts: Vec<String> = alternatives
                .iter()
                .map(|(label, alt)| format!("(Label: {label}, Session: {})", encode_node(alt)))
                .collect();
            format!("Choice, Dir: {dir}, Alternatives: [{}]", alts.join(", "))
        }
        Session::Def { name, cont } => {
            format!("Def, Name: {name}, Cont: {}", encode(cont))
        }
        Session::Ref { name } => format!("Ref, Name: {name}"),
        Session::End => "End".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::PayloadType;

    use super::*;

    fn number_single(dir: Direction, cont: Session) -> Session {
        Session::Single {
            dir,
            payload: PayloadType::Number,
            cont: Box::new(cont),
        }
    }

    /// The arithmetic protocol from the proxy's wire documentation.
    fn protocol_a_text() -> &'static str {
        "Session: Def, Name: A, Cont: Session: Choice, Dir: send, Alternatives: \
         [(Label: Neg, Session: Single, Dir: recv, Payload: { type: \"number\" }, Cont: \
         Session: Single, Dir: send, Payload: { type: \"number\" }, Cont: \
         Session: Ref, Name: A), \
         (Label: Quit, Session: End)]"
    }

    #[test]
    fn test_decode_end() {
        assert_eq!(decode("Session: End").unwrap(), Session::End);
    }

    #[test]
    fn test_decode_single_chain() {
        let text = "Session: Single, Dir: recv, Payload: { type: \"number\" }, Cont: Session: End";
        let session = decode(text).unwrap();
        assert_eq!(session, number_single(Direction::Recv, Session::End));
    }

    #[test]
    fn test_decode_protocol_a() {
        let session = decode(protocol_a_text()).unwrap();
        let Session::Def { name, cont } = session else {
            panic!("expected Def, got {}", session.kind());
        };
        assert_eq!(name, "A");
        let Session::Choice { alternatives, .. } = *cont else {
            panic!("expected Choice");
        };
        assert_eq!(alternatives.len(), 2);
        assert_eq!(alternatives[0].0, Label::new("Neg"));
        assert_eq!(alternatives[1].0, Label::new("Quit"));
        assert_eq!(alternatives[1].1, Session::End);

        // Neg: recv number, send number, back to A.
        let neg = &alternatives[0].1;
        assert_eq!(
            *neg,
            number_single(
                Direction::Recv,
                number_single(
                    Direction::Send,
                    Session::Ref {
                        name: "A".to_string()
                    }
                )
            )
        );
    }

    #[test]
    fn test_decode_rejects_bad_prefix() {
        assert!(matches!(decode("Sessions: End"), Err(StpError::Syntax(_))));
        assert!(matches!(decode("Session: Sing"), Err(StpError::Syntax(_))));
    }

    #[test]
    fn test_decode_rejects_bad_direction() {
        let text = "Session: Single, Dir: left, Payload: { type: \"number\" }, Cont: Session: End";
        assert!(decode(text).is_err());
    }

    #[test]
    fn test_decode_rejects_trailing_garbage() {
        assert!(decode("Session: End trailing").is_err());
    }

    #[test]
    fn test_decode_rejects_unclosed_alternatives() {
        let text = "Session: Choice, Dir: send, Alternatives: [(Label: Quit, Session: End)";
        assert!(decode(text).is_err());
    }

    #[test]
    fn test_roundtrip_programmatic_graphs() {
        let graphs = vec![
            Session::End,
            number_single(Direction::Send, Session::End),
            Session::Def {
                name: "A".to_string(),
                cont: Box::new(Session::Choice {
                    dir: Direction::Send,
                    alternatives: vec![
                        (
                            Label::new("Neg"),
                            number_single(
                                Direction::Recv,
                                number_single(
                                    Direction::Send,
                                    Session::Ref {
                                        name: "A".to_string(),
                                    },
                                ),
                            ),
                        ),
                        (Label::new("Quit"), Session::End),
                    ],
                }),
            },
        ];
        for graph in graphs {
            assert_eq!(decode(&encode(&graph)).unwrap(), graph);
        }
    }

    #[test]
    fn test_roundtrip_protocol_a_text() {
        // The documented text is already canonical.
        let session = decode(protocol_a_text()).unwrap();
        assert_eq!(encode(&session), protocol_a_text());
    }

    #[test]
    fn test_mirroring_law() {
        let text = "Session: Single, Dir: send, Payload: { type: \"number\" }, Cont: Session: End";
        let server = decode_for_role(text, Role::Server).unwrap();
        let client = decode_for_role(text, Role::Client).unwrap();
        assert_eq!(server, number_single(Direction::Send, Session::End));
        assert_eq!(client, number_single(Direction::Recv, Session::End));

        let text = "Session: Single, Dir: recv, Payload: { type: \"number\" }, Cont: Session: End";
        let server = decode_for_role(text, Role::Server).unwrap();
        let client = decode_for_role(text, Role::Client).unwrap();
        assert_eq!(server, number_single(Direction::Recv, Session::End));
        assert_eq!(client, number_single(Direction::Send, Session::End));
    }

    #[test]
    fn test_roundtrip_deep_mixed_graph() {
        let graph = Session::Def {
            name: "Outer".to_string(),
            cont: Box::new(Session::Choice {
                dir: Direction::Send,
                alternatives: vec![
                    (
                        Label::new("Walk"),
                        number_single(
                            Direction::Send,
                            Session::Choice {
                                dir: Direction::Recv,
                                alternatives: vec![(Label::new("Stop"), Session::End)],
                            },
                        ),
                    ),
                    (
                        Label::new("Back"),
                        Session::Ref {
                            name: "Outer".to_string(),
                        },
                    ),
                ],
            }),
        };
        assert_eq!(decode(&encode(&graph)).unwrap(), graph);
    }

    #[test]
    fn test_role_suffixes_def_and_ref_names() {
        let session = decode_for_role(protocol_a_text(), Role::Client).unwrap();
        let Session::Def { name, cont } = session else {
            panic!("expected Def");
        };
        assert_eq!(name, "A_client");
        let tail = cont
            .alternative(&Label::new("Neg"))
            .expect("Neg alternative");
        // recv declared, client view flips to send; tail ref renamed.
        let Session::Single { dir, cont, .. } = tail else {
            panic!("expected Single");
        };
        assert_eq!(*dir, Direction::Send);
        let Session::Single { cont, .. } = &**cont else {
            panic!("expected Single");
        };
        assert_eq!(
            **cont,
            Session::Ref {
                name: "A_client".to_string()
            }
        );
    }
}
