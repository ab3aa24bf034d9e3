use nom::{
    branch::alt,
    bytes::complete::{tag, take_till},
    character::complete::{alpha1, alphanumeric1, char, multispace1, not_line_ending, satisfy},
    combinator::{all_consuming, consumed, cut, map_res, not, opt, recognize, value},
    multi::{many0, many0_count, separated_list0},
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult, Parser,
};
use nom_locate::LocatedSpan;
use nom_supreme::error::{ErrorTree, GenericErrorTree, StackContext};
use nom_supreme::ParserExt;
use pv_data_model::{
    Access, AttributeSchema, ElementType, FunctionSchema, GroupSchema, MemberSchema,
    ParameterSchema, Value,
};

use crate::SchemaError;

type Span<'a> = LocatedSpan<&'a str>;
type PResult<'a, T> = IResult<Span<'a>, T, ErrorTree<Span<'a>>>;

#[derive(Debug, Clone, PartialEq)]
enum Number {
    Int(i64),
    Double(f64),
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Numbers(Vec<Number>),
    Text(String),
}

impl Literal {
    fn into_value(self) -> Value {
        match self {
            Literal::Text(s) => Value::String(s),
            Literal::Numbers(numbers) => {
                if numbers.iter().all(|n| matches!(n, Number::Int(_))) {
                    Value::Int(
                        numbers
                            .into_iter()
                            .filter_map(|n| match n {
                                Number::Int(i) => Some(i),
                                Number::Double(_) => None,
                            })
                            .collect(),
                    )
                } else {
                    Value::Double(
                        numbers
                            .into_iter()
                            .map(|n| match n {
                                Number::Int(i) => i as f64,
                                Number::Double(d) => d,
                            })
                            .collect(),
                    )
                }
            }
        }
    }
}

struct RawParameter<'a> {
    element_type: Span<'a>,
    name: Span<'a>,
    default: Option<(Span<'a>, Literal)>,
}

enum RawMember<'a> {
    Attribute {
        doc: String,
        readonly: bool,
        element_type: Span<'a>,
        name: Span<'a>,
    },
    Function {
        doc: String,
        name: Span<'a>,
        parameters: Vec<RawParameter<'a>>,
        return_type: Span<'a>,
    },
}

impl RawMember<'_> {
    fn set_doc(&mut self, text: String) {
        match self {
            RawMember::Attribute { doc, .. } | RawMember::Function { doc, .. } => *doc = text,
        }
    }
}

struct RawGroup<'a> {
    doc: String,
    name: Span<'a>,
    members: Vec<RawMember<'a>>,
}

fn line_comment(input: Span) -> PResult<Span> {
    recognize(tuple((tag("//"), not(char('/')), not_line_ending)))(input)
}

/// Whitespace and plain comments; doc comments are left in place.
fn ws(input: Span) -> PResult<()> {
    value(
        (),
        many0_count(alt((value((), multispace1), value((), line_comment)))),
    )(input)
}

fn docs(input: Span) -> PResult<String> {
    many0(terminated(preceded(tag("///"), not_line_ending), ws))
        .map(|lines: Vec<Span>| {
            lines
                .iter()
                .map(|l| l.fragment().trim())
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .parse(input)
}

fn identifier(input: Span) -> PResult<Span> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(Span<'a>) -> PResult<'a, Span<'a>> {
    terminated(tag(kw), not(satisfy(|c: char| c.is_alphanumeric() || c == '_')))
}

fn comma(input: Span) -> PResult<char> {
    delimited(ws, char(','), ws)(input)
}

fn number(input: Span) -> PResult<Number> {
    map_res(recognize_float, |text: Span| {
        let text = *text.fragment();
        match text.parse::<i64>() {
            Ok(i) => Ok(Number::Int(i)),
            Err(_) => text.parse::<f64>().map(Number::Double),
        }
    })(input)
}

fn literal(input: Span) -> PResult<Literal> {
    alt((
        delimited(
            terminated(char('['), ws),
            separated_list0(comma, number),
            preceded(ws, char(']')),
        )
        .map(Literal::Numbers),
        delimited(char('"'), take_till(|c| c == '"'), char('"'))
            .map(|s: Span| Literal::Text(s.fragment().to_string())),
    ))(input)
}

fn parameter(input: Span) -> PResult<RawParameter> {
    tuple((
        identifier,
        preceded(ws, identifier),
        opt(preceded(tuple((ws, char('='), ws)), consumed(literal))),
    ))
    .map(|(element_type, name, default)| RawParameter {
        element_type,
        name,
        default,
    })
    .context("parameter")
    .parse(input)
}

fn attribute(input: Span) -> PResult<RawMember> {
    let (input, readonly) = opt(terminated(keyword("readonly"), ws))(input)?;
    let (input, _) = keyword("attribute")(input)?;
    let (input, (element_type, name)) = cut(terminated(
        tuple((preceded(ws, identifier), preceded(ws, identifier))),
        preceded(ws, char(';')),
    ))
    .context("attribute")
    .parse(input)?;

    Ok((
        input,
        RawMember::Attribute {
            doc: String::new(),
            readonly: readonly.is_some(),
            element_type,
            name,
        },
    ))
}

fn function(input: Span) -> PResult<RawMember> {
    let (input, _) = keyword("function")(input)?;
    let (input, (name, parameters, return_type)) = cut(tuple((
        preceded(ws, identifier),
        delimited(
            tuple((ws, char('('), ws)),
            separated_list0(comma, parameter),
            tuple((ws, char(')'))),
        ),
        delimited(tuple((ws, tag("->"), ws)), identifier, tuple((ws, char(';')))),
    )))
    .context("function")
    .parse(input)?;

    Ok((
        input,
        RawMember::Function {
            doc: String::new(),
            name,
            parameters,
            return_type,
        },
    ))
}

fn member(input: Span) -> PResult<RawMember> {
    let (input, doc) = docs(input)?;
    let (input, mut member) = alt((function, attribute))(input)?;
    member.set_doc(doc);
    Ok((input, member))
}

fn group(input: Span) -> PResult<RawGroup> {
    let (input, doc) = docs(input)?;
    let (input, _) = keyword("group")(input)?;
    let (input, (name, members)) = cut(tuple((
        preceded(ws, identifier),
        delimited(
            preceded(ws, char('{')),
            many0(preceded(ws, member)),
            preceded(ws, char('}')),
        ),
    )))
    .context("group")
    .parse(input)?;

    Ok((input, RawGroup { doc, name, members }))
}

fn groups(input: Span) -> PResult<Vec<RawGroup>> {
    all_consuming(delimited(ws, many0(terminated(group, ws)), ws))(input)
}

/// Offset and description of the deepest point the parser reached.
fn furthest(tree: &ErrorTree<Span<'_>>) -> (usize, String) {
    match tree {
        GenericErrorTree::Base { location, kind } => (location.location_offset(), kind.to_string()),
        GenericErrorTree::Stack { base, contexts } => {
            let (offset, message) = furthest(base);
            let context = contexts.iter().find_map(|(_, ctx)| match ctx {
                StackContext::Context(c) => Some(*c),
                StackContext::Kind(_) => None,
            });
            match context {
                Some(context) => (offset, format!("{message} in {context}")),
                None => (offset, message),
            }
        }
        GenericErrorTree::Alt(alternatives) => alternatives
            .iter()
            .map(furthest)
            .max_by_key(|(offset, _)| *offset)
            .unwrap_or_else(|| (0, "unexpected input".to_string())),
    }
}

struct Builder<'s> {
    src: &'s str,
}

impl Builder<'_> {
    fn element_type(&self, span: Span) -> Result<ElementType, SchemaError> {
        span.fragment()
            .parse()
            .map_err(|_| SchemaError::UnknownType {
                src: self.src.to_string(),
                at: (span.location_offset(), span.fragment().len()).into(),
                name: span.fragment().to_string(),
            })
    }

    fn parameter(&self, raw: RawParameter) -> Result<ParameterSchema, SchemaError> {
        let element_type = self.element_type(raw.element_type)?;
        let default = match raw.default {
            None => Value::default_for(element_type),
            Some((span, literal)) => {
                let value = literal.into_value();
                let shown = value.to_string();
                value
                    .coerce(element_type)
                    .ok_or_else(|| SchemaError::InvalidDefault {
                        src: self.src.to_string(),
                        at: (span.location_offset(), span.fragment().len()).into(),
                        value: shown,
                        element_type,
                    })?
            }
        };

        Ok(ParameterSchema {
            name: raw.name.fragment().to_string(),
            element_type: element_type.name().to_string(),
            default,
        })
    }

    fn member(&self, raw: RawMember) -> Result<MemberSchema, SchemaError> {
        match raw {
            RawMember::Attribute {
                doc,
                readonly,
                element_type,
                name,
            } => Ok(MemberSchema::Attribute(AttributeSchema {
                name: name.fragment().to_string(),
                element_type: self.element_type(element_type)?.name().to_string(),
                access: if readonly {
                    Access::ReadOnly
                } else {
                    Access::ReadWrite
                },
                doc,
            })),
            RawMember::Function {
                doc,
                name,
                parameters,
                return_type,
            } => Ok(MemberSchema::Function(FunctionSchema {
                name: name.fragment().to_string(),
                doc,
                parameters: parameters
                    .into_iter()
                    .map(|p| self.parameter(p))
                    .collect::<Result<_, _>>()?,
                return_type: self.element_type(return_type)?.name().to_string(),
            })),
        }
    }

    fn group(&self, raw: RawGroup) -> Result<GroupSchema, SchemaError> {
        Ok(GroupSchema {
            name: raw.name.fragment().to_string(),
            doc: raw.doc,
            members: raw
                .members
                .into_iter()
                .map(|m| self.member(m))
                .collect::<Result<_, _>>()?,
        })
    }
}

pub(crate) fn schema(src: &str) -> Result<Vec<GroupSchema>, SchemaError> {
    let raw = match groups(Span::new(src)) {
        Ok((_, raw)) => raw,
        Err(nom::Err::Error(tree)) | Err(nom::Err::Failure(tree)) => {
            let (offset, message) = furthest(&tree);
            let len = usize::from(offset < src.len());
            return Err(SchemaError::Syntax {
                src: src.to_string(),
                at: (offset, len).into(),
                message,
            });
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(SchemaError::Syntax {
                src: src.to_string(),
                at: (src.len(), 0).into(),
                message: "unexpected end of input".to_string(),
            })
        }
    };

    let builder = Builder { src };
    raw.into_iter().map(|g| builder.group(g)).collect()
}
