use fxhash::FxHashMap;
use thiserror::Error;

use crate::atom::{Atom, AtomId};
use crate::clause::Clause;
use crate::formula::Formula;
use crate::literal::Literal;
use crate::signature::Signature;
use crate::term::Term;

/// The only TPTP surface the core carries: printing clauses and formulas, and
/// the narrow re-parse of generated schema instances. This is an in-memory
/// scanner; nothing touches the filesystem.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("unsupported input kind: {0}")]
    UnsupportedInput(String),
}

/// One parsed TPTP input.
#[derive(Debug)]
pub enum TptpInput {
    Formula {
        name: String,
        role: String,
        formula: Formula,
    },
    Clause {
        name: String,
        role: String,
        clause: Clause,
    },
}

// ---------------------------------------------------------------------------
// Printing
// ---------------------------------------------------------------------------

fn term_to_tptp(sig: &Signature, term: &Term, out: &mut String) {
    match term.head {
        Atom::Variable(i) => out.push_str(&format!("X{}", i)),
        Atom::True => out.push_str("$true"),
        Atom::Symbol(id) => out.push_str(&sig.symbol_name(id)),
    }
    if !term.args.is_empty() {
        out.push('(');
        for (i, arg) in term.args.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            term_to_tptp(sig, arg, out);
        }
        out.push(')');
    }
}

fn literal_to_tptp(sig: &Signature, literal: &Literal, out: &mut String) {
    if literal.is_predicate() {
        if !literal.positive {
            out.push('~');
        }
        term_to_tptp(sig, &literal.left, out);
    } else {
        term_to_tptp(sig, &literal.left, out);
        out.push_str(if literal.positive { "=" } else { "!=" });
        term_to_tptp(sig, &literal.right, out);
    }
}

/// Renders a clause as a cnf annotated formula.
pub fn clause_to_tptp(sig: &Signature, clause: &Clause, name: &str, role: &str) -> String {
    let mut body = String::new();
    if clause.is_empty() {
        body.push_str("$false");
    } else {
        for (i, literal) in clause.literals.iter().enumerate() {
            if i > 0 {
                body.push('|');
            }
            literal_to_tptp(sig, literal, &mut body);
        }
    }
    format!("cnf({},{},({})).", name, role, body)
}

fn formula_body_to_tptp(sig: &Signature, formula: &Formula, out: &mut String) {
    match formula {
        Formula::Atom(t) => term_to_tptp(sig, t, out),
        Formula::Eq(a, b) => {
            term_to_tptp(sig, a, out);
            out.push('=');
            term_to_tptp(sig, b, out);
        }
        Formula::Not(f) => {
            out.push('~');
            formula_body_to_tptp(sig, f, out);
        }
        Formula::And(a, b) | Formula::Or(a, b) | Formula::Implies(a, b) | Formula::Iff(a, b) => {
            let op = match formula {
                Formula::And(..) => "&",
                Formula::Or(..) => "|",
                Formula::Implies(..) => "=>",
                _ => "<=>",
            };
            out.push('(');
            formula_body_to_tptp(sig, a, out);
            out.push_str(op);
            formula_body_to_tptp(sig, b, out);
            out.push(')');
        }
        Formula::Forall(v, f) => {
            out.push_str(&format!("![X{}]:", v));
            formula_body_to_tptp(sig, f, out);
        }
        Formula::Exists(v, f) => {
            out.push_str(&format!("?[X{}]:", v));
            formula_body_to_tptp(sig, f, out);
        }
    }
}

/// Renders a formula as a fof annotated formula.
pub fn formula_to_tptp(sig: &Signature, formula: &Formula, name: &str, role: &str) -> String {
    let mut body = String::new();
    formula_body_to_tptp(sig, formula, &mut body);
    format!("fof({},{},({})).", name, role, body)
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Var(String),
    DollarFalse,
    DollarTrue,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Bang,
    Question,
    Tilde,
    Amp,
    Pipe,
    Eq,
    Neq,
    Implies,
    Iff,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = vec![];
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            ':' => {
                chars.next();
                tokens.push(Token::Colon);
            }
            '?' => {
                chars.next();
                tokens.push(Token::Question);
            }
            '~' => {
                chars.next();
                tokens.push(Token::Tilde);
            }
            '&' => {
                chars.next();
                tokens.push(Token::Amp);
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Neq);
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'>') {
                    chars.next();
                    tokens.push(Token::Implies);
                } else {
                    tokens.push(Token::Eq);
                }
            }
            '<' => {
                chars.next();
                if chars.next() == Some('=') && chars.next() == Some('>') {
                    tokens.push(Token::Iff);
                } else {
                    return Err(ParseError::UnexpectedToken("<".to_string()));
                }
            }
            '$' => {
                chars.next();
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "false" => tokens.push(Token::DollarFalse),
                    "true" => tokens.push(Token::DollarTrue),
                    other => return Err(ParseError::UnexpectedToken(format!("${}", other))),
                }
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if word.chars().next().unwrap().is_uppercase() {
                    tokens.push(Token::Var(word));
                } else {
                    tokens.push(Token::Ident(word));
                }
            }
            other => return Err(ParseError::UnexpectedToken(other.to_string())),
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    sig: &'a mut Signature,
    vars: FxHashMap<String, AtomId>,
    next_var: AtomId,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token>, sig: &'a mut Signature) -> Parser<'a> {
        Parser {
            tokens,
            pos: 0,
            sig,
            vars: FxHashMap::default(),
            next_var: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, ParseError> {
        let token = self.tokens.get(self.pos).cloned().ok_or(ParseError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        let token = self.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken(format!("{:?}", token)))
        }
    }

    fn var_id(&mut self, name: &str) -> AtomId {
        if let Some(&id) = self.vars.get(name) {
            return id;
        }
        let id = self.next_var;
        self.next_var += 1;
        self.vars.insert(name.to_string(), id);
        id
    }

    fn parse_term(&mut self) -> Result<Term, ParseError> {
        match self.next()? {
            Token::Var(name) => {
                let id = self.var_id(&name);
                Ok(Term::variable(id))
            }
            Token::Ident(name) => {
                let symbol = self.sig.intern(&name);
                let mut args = vec![];
                if self.peek() == Some(&Token::LParen) {
                    self.next()?;
                    loop {
                        args.push(self.parse_term()?);
                        match self.next()? {
                            Token::Comma => continue,
                            Token::RParen => break,
                            token => {
                                return Err(ParseError::UnexpectedToken(format!("{:?}", token)))
                            }
                        }
                    }
                }
                self.sig.set_arity(symbol, args.len());
                Ok(Term::new(Atom::Symbol(symbol), args))
            }
            Token::DollarTrue => Ok(Term::new_true()),
            token => Err(ParseError::UnexpectedToken(format!("{:?}", token))),
        }
    }

    // term, term = term, or term != term; also $true/$false.
    fn parse_atomic(&mut self) -> Result<Formula, ParseError> {
        if self.peek() == Some(&Token::DollarFalse) {
            self.next()?;
            // An empty disjunction; encode as ~$true.
            return Ok(Formula::not(Formula::Atom(Term::new_true())));
        }
        let term = self.parse_term()?;
        match self.peek() {
            Some(Token::Eq) => {
                self.next()?;
                let right = self.parse_term()?;
                Ok(Formula::Eq(term, right))
            }
            Some(Token::Neq) => {
                self.next()?;
                let right = self.parse_term()?;
                Ok(Formula::not(Formula::Eq(term, right)))
            }
            _ => Ok(Formula::Atom(term)),
        }
    }

    fn parse_quantifier_vars(&mut self) -> Result<Vec<AtomId>, ParseError> {
        self.expect(Token::LBracket)?;
        let mut ids = vec![];
        loop {
            match self.next()? {
                Token::Var(name) => {
                    // A quantified variable always gets a fresh id so binders
                    // stay distinct; it shadows any outer use of the name.
                    let id = self.next_var;
                    self.next_var += 1;
                    self.vars.insert(name, id);
                    ids.push(id);
                }
                token => return Err(ParseError::UnexpectedToken(format!("{:?}", token))),
            }
            match self.next()? {
                Token::Comma => continue,
                Token::RBracket => break,
                token => return Err(ParseError::UnexpectedToken(format!("{:?}", token))),
            }
        }
        self.expect(Token::Colon)?;
        Ok(ids)
    }

    fn parse_unit(&mut self) -> Result<Formula, ParseError> {
        match self.peek() {
            Some(Token::Bang) => {
                self.next()?;
                let ids = self.parse_quantifier_vars()?;
                let mut body = self.parse_unit()?;
                for &id in ids.iter().rev() {
                    body = Formula::forall(id, body);
                }
                Ok(body)
            }
            Some(Token::Question) => {
                self.next()?;
                let ids = self.parse_quantifier_vars()?;
                let mut body = self.parse_unit()?;
                for &id in ids.iter().rev() {
                    body = Formula::exists(id, body);
                }
                Ok(body)
            }
            Some(Token::Tilde) => {
                self.next()?;
                Ok(Formula::not(self.parse_unit()?))
            }
            Some(Token::LParen) => {
                self.next()?;
                let formula = self.parse_formula()?;
                self.expect(Token::RParen)?;
                Ok(formula)
            }
            _ => self.parse_atomic(),
        }
    }

    fn parse_formula(&mut self) -> Result<Formula, ParseError> {
        let first = self.parse_unit()?;
        match self.peek() {
            Some(Token::Amp) => {
                let mut formula = first;
                while self.peek() == Some(&Token::Amp) {
                    self.next()?;
                    formula = Formula::and(formula, self.parse_unit()?);
                }
                Ok(formula)
            }
            Some(Token::Pipe) => {
                let mut formula = first;
                while self.peek() == Some(&Token::Pipe) {
                    self.next()?;
                    formula = Formula::or(formula, self.parse_unit()?);
                }
                Ok(formula)
            }
            Some(Token::Implies) => {
                self.next()?;
                Ok(Formula::implies(first, self.parse_unit()?))
            }
            Some(Token::Iff) => {
                self.next()?;
                Ok(Formula::iff(first, self.parse_unit()?))
            }
            _ => Ok(first),
        }
    }

    // cnf clause body: literal (| literal)*
    fn parse_clause(&mut self) -> Result<Clause, ParseError> {
        let mut literals = vec![];
        loop {
            let negated = if self.peek() == Some(&Token::Tilde) {
                self.next()?;
                true
            } else {
                false
            };
            match self.parse_atomic()? {
                Formula::Atom(t) => literals.push(Literal::new(!negated, t, Term::new_true())),
                Formula::Eq(a, b) => literals.push(Literal::new(!negated, a, b)),
                Formula::Not(inner) => match *inner {
                    Formula::Eq(a, b) => literals.push(Literal::new(negated, a, b)),
                    Formula::Atom(t) if t.is_true() => {
                        // $false: contributes no literal.
                    }
                    _ => return Err(ParseError::UnexpectedToken("~".to_string())),
                },
                _ => return Err(ParseError::UnexpectedToken("formula in cnf".to_string())),
            }
            match self.peek() {
                Some(Token::Pipe) => {
                    self.next()?;
                }
                _ => break,
            }
        }
        Ok(Clause::new(literals))
    }

    fn parse_name(&mut self) -> Result<String, ParseError> {
        match self.next()? {
            Token::Ident(name) => Ok(name),
            Token::Var(name) => Ok(name),
            token => Err(ParseError::UnexpectedToken(format!("{:?}", token))),
        }
    }

    fn parse_input(&mut self) -> Result<TptpInput, ParseError> {
        let kind = self.parse_name()?;
        self.expect(Token::LParen)?;
        let name = self.parse_name()?;
        self.expect(Token::Comma)?;
        let role = self.parse_name()?;
        self.expect(Token::Comma)?;
        // Fresh variable scope per input.
        self.vars.clear();
        let input = match kind.as_str() {
            "fof" => {
                let formula = self.parse_unit()?;
                TptpInput::Formula {
                    name,
                    role,
                    formula,
                }
            }
            "cnf" => {
                let had_paren = if self.peek() == Some(&Token::LParen) {
                    self.next()?;
                    true
                } else {
                    false
                };
                let clause = self.parse_clause()?;
                if had_paren {
                    self.expect(Token::RParen)?;
                }
                TptpInput::Clause { name, role, clause }
            }
            other => return Err(ParseError::UnsupportedInput(other.to_string())),
        };
        self.expect(Token::RParen)?;
        self.expect(Token::Dot)?;
        Ok(input)
    }
}

/// Parses a sequence of fof/cnf inputs from an in-memory string.
pub fn parse(sig: &mut Signature, text: &str) -> Result<Vec<TptpInput>, ParseError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser::new(tokens, sig);
    let mut inputs = vec![];
    while parser.peek().is_some() {
        inputs.push(parser.parse_input()?);
    }
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cnf() {
        let mut sig = Signature::new();
        let inputs = parse(&mut sig, "cnf(c1,axiom,(member(X1,X2)|~equal(X1,X2))).").unwrap();
        assert_eq!(inputs.len(), 1);
        match &inputs[0] {
            TptpInput::Clause { clause, role, .. } => {
                assert_eq!(role, "axiom");
                assert_eq!(clause.len(), 2);
            }
            _ => panic!("expected a clause"),
        }
    }

    #[test]
    fn test_parse_fof_quantifiers() {
        let mut sig = Signature::new();
        let inputs =
            parse(&mut sig, "fof(f1,axiom,(![X]:?[Y]:(member(X,Y)<=>~member(Y,X)))).").unwrap();
        match &inputs[0] {
            TptpInput::Formula { formula, .. } => {
                assert!(matches!(formula, Formula::Forall(..)));
                assert_eq!(formula.free_variables(), vec![]);
            }
            _ => panic!("expected a formula"),
        }
    }

    #[test]
    fn test_clause_print_parse_roundtrip() {
        let mut sig = Signature::new();
        let member = sig.member();
        let clause = Clause::new(vec![
            Literal::positive_atom(Term::new(
                Atom::Symbol(member),
                vec![Term::variable(0), Term::variable(1)],
            )),
            Literal::not_equals(Term::variable(0), Term::variable(1)),
        ]);
        let text = clause_to_tptp(&sig, &clause, "c1", "axiom");
        let inputs = parse(&mut sig, &text).unwrap();
        match &inputs[0] {
            TptpInput::Clause { clause: parsed, .. } => {
                assert!(crate::subsumption::is_variant(parsed, &clause));
            }
            _ => panic!("expected a clause"),
        }
    }

    #[test]
    fn test_parse_failure_is_an_error() {
        let mut sig = Signature::new();
        assert!(parse(&mut sig, "fof(f1,axiom,(member(X,)").is_err());
        assert!(parse(&mut sig, "tff(f1,axiom,$true).").is_err());
    }

    #[test]
    fn test_empty_clause_prints_as_false() {
        let sig = Signature::new();
        let text = clause_to_tptp(&sig, &Clause::impossible(), "e", "plain");
        assert_eq!(text, "cnf(e,plain,($false)).");
    }

    #[test]
    fn test_parse_multiple_inputs() {
        use indoc::indoc;
        let text = indoc! {"
            fof(a1,axiom,(![X]:member(X,X))).
            cnf(c1,axiom,(member(X1,X2)|~member(X2,X1))).
            cnf(c2,negated_conjecture,($false)).
        "};
        let mut sig = Signature::new();
        let inputs = parse(&mut sig, text).unwrap();
        assert_eq!(inputs.len(), 3);
        match &inputs[2] {
            TptpInput::Clause { clause, role, .. } => {
                assert!(clause.is_empty());
                assert_eq!(role, "negated_conjecture");
            }
            _ => panic!("expected a clause"),
        }
    }

    proptest::proptest! {
        #[test]
        fn prop_clause_print_parse_is_variant(
            clause in crate::clause::strategies::arb_clause()
        ) {
            let mut sig = Signature::new();
            sig.register_fallback_names(&clause);
            let text = clause_to_tptp(&sig, &clause, "c", "axiom");
            let inputs = parse(&mut sig, &text).unwrap();
            match &inputs[0] {
                TptpInput::Clause { clause: parsed, .. } => {
                    proptest::prop_assert!(crate::subsumption::is_variant(parsed, &clause));
                }
                _ => panic!("expected a clause"),
            }
        }
    }
}
