//! Write `dagrad` graphs as plain arithmetic.
//!
//! ```ignore
//! let graph = dagrad::Graph::new();
//! dagrad! { graph;
//!     let x1;
//!     let x2;
//!     let z = exp(x1 * x2 + 5 * x1);
//! }
//! z.forward(&[("x1", 0.2), ("x2", 0.3)])?;
//! ```
//!
//! `let name;` declares a variable bound by the environment at evaluation
//! time, `let name = <literal>;` a constant, and any other `let` builds the
//! expression out of intermediate terms. Calls to `exp`, `ln`, `sin`, `cos`,
//! `tanh` and `sigmoid` map to the built-in operators; a call to any other
//! function `f` becomes a custom unary operator using `f` and `f_derive`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input,
    spanned::Spanned,
    BinOp, Block, Expr, ExprLit, Ident, Lit, Pat, Stmt, Token, UnOp,
};

const BUILTINS: [&str; 6] = ["exp", "ln", "sin", "cos", "tanh", "sigmoid"];

struct Input {
    graph: Expr,
    stmts: Vec<Stmt>,
}

impl Parse for Input {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let graph = input.parse()?;
        input.parse::<Token![;]>()?;
        let stmts = Block::parse_within(input)?;
        Ok(Self { graph, stmts })
    }
}

#[proc_macro]
pub fn dagrad(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as Input);

    let mut terms = vec![];

    for stmt in &input.stmts {
        if let Err(e) = traverse_stmt(stmt, &input.graph, &mut terms) {
            return e.to_compile_error().into();
        }
    }

    let expanded = quote! {
        #(#terms)*
    };

    TokenStream::from(expanded)
}

fn traverse_stmt(input: &Stmt, graph: &Expr, terms: &mut Vec<TokenStream2>) -> syn::Result<()> {
    match input {
        Stmt::Local(local) => {
            let Pat::Ident(id) = &local.pat else {
                return Err(syn::Error::new(
                    local.pat.span(),
                    "expected a plain identifier",
                ));
            };
            let name = id.ident.clone();
            let ts = match &local.init {
                None => quote! {
                    let #name = ::dagrad::Graph::variable(&#graph, stringify!(#name));
                },
                Some(init) => match &*init.expr {
                    Expr::Lit(lit) => {
                        let value = literal(lit)?;
                        quote! {
                            let #name = ::dagrad::Graph::constant(&#graph, #value);
                        }
                    }
                    Expr::Path(path) => quote! {
                        let #name = #path;
                    },
                    ex => {
                        let res = traverse_expr(ex, graph, terms)?;
                        quote! {
                            let #name = #res;
                        }
                    }
                },
            };
            terms.push(ts);
            Ok(())
        }
        Stmt::Expr(ex, _) => traverse_expr(ex, graph, terms).map(|_| ()),
        _ => Err(syn::Error::new(input.span(), "unsupported statement")),
    }
}

fn var_name(terms: &[TokenStream2]) -> String {
    format!("_a{}", terms.len())
}

/// Integer literals are accepted and converted, so `5 * x` works.
fn literal(ex: &ExprLit) -> syn::Result<TokenStream2> {
    match &ex.lit {
        Lit::Float(_) => Ok(quote! { #ex }),
        Lit::Int(_) => Ok(quote! { (#ex as f64) }),
        _ => Err(syn::Error::new(ex.span(), "expected a number")),
    }
}

fn format_term(ex: &ExprLit, graph: &Expr, terms: &mut Vec<TokenStream2>) -> syn::Result<Ident> {
    let name = Ident::new(&var_name(terms), ex.span());
    let value = literal(ex)?;
    let ts = quote! {
        let #name = ::dagrad::Graph::constant(&#graph, #value);
    };
    terms.push(ts);
    Ok(name)
}

fn traverse_expr(input: &Expr, graph: &Expr, terms: &mut Vec<TokenStream2>) -> syn::Result<Ident> {
    match input {
        Expr::Binary(ex) => {
            let lhs = traverse_expr(&ex.left, graph, terms)?;
            let rhs = traverse_expr(&ex.right, graph, terms)?;
            let name = Ident::new(&var_name(terms), ex.span());
            let binop = match ex.op {
                BinOp::Add(_) => quote! { #lhs + #rhs },
                BinOp::Sub(_) => quote! { #lhs - #rhs },
                BinOp::Mul(_) => quote! { #lhs * #rhs },
                BinOp::Div(_) => quote! { #lhs / #rhs },
                _ => return Err(syn::Error::new(ex.op.span(), "unsupported operator")),
            };
            terms.push(quote! {
                let #name = #binop;
            });
            Ok(name)
        }
        Expr::Unary(ex) => {
            let UnOp::Neg(_) = ex.op else {
                return Err(syn::Error::new(ex.op.span(), "unsupported operator"));
            };
            let operand = traverse_expr(&ex.expr, graph, terms)?;
            let name = Ident::new(&var_name(terms), ex.span());
            terms.push(quote! {
                let #name = -#operand;
            });
            Ok(name)
        }
        Expr::Paren(ex) => traverse_expr(&ex.expr, graph, terms),
        Expr::Lit(lit) => format_term(lit, graph, terms),
        Expr::Path(path) => path
            .path
            .get_ident()
            .cloned()
            .ok_or_else(|| syn::Error::new(path.span(), "expected a term name")),
        Expr::Call(call) => {
            let (Expr::Path(func), Some(arg), 1) = (&*call.func, call.args.first(), call.args.len())
            else {
                return Err(syn::Error::new(
                    call.span(),
                    "expected a call of a unary function",
                ));
            };
            let arg = traverse_expr(arg, graph, terms)?;
            let name = Ident::new(&var_name(terms), call.span());
            let builtin = func
                .path
                .get_ident()
                .filter(|ident| BUILTINS.contains(&ident.to_string().as_str()));
            let ts = if let Some(method) = builtin {
                quote! {
                    let #name = #arg.#method();
                }
            } else {
                let mut func_derive = func.clone();
                if let Some(seg) = func_derive.path.segments.last_mut() {
                    seg.ident = Ident::new(&format!("{}_derive", seg.ident), func.span());
                }
                quote! {
                    let #name = #arg.apply(stringify!(#func), #func, #func_derive);
                }
            };
            terms.push(ts);
            Ok(name)
        }
        _ => Err(syn::Error::new(input.span(), "unsupported expression")),
    }
}
