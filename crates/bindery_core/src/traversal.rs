use std::collections::HashSet;
use std::hash::Hash;
use std::rc::Rc;

/// A directed graph that can be walked by [`traverse`].
///
/// Children must be returned in edge insertion order so traversal is
/// deterministic across runs for the same graph state.
pub trait TraversalGraph {
  type NodeId: Clone + Eq + Hash;

  fn children(&self, node: Self::NodeId) -> Vec<Self::NodeId>;
}

/// Caller-controlled early termination for a traversal.
///
/// Handed to every enter call; `skip_children` prunes the current subtree
/// while `stop` aborts the whole traversal with no further enter/exit calls.
#[derive(Debug, Default)]
pub struct TraversalActions {
  skip_children: bool,
  stop: bool,
}

impl TraversalActions {
  pub fn skip_children(&mut self) {
    self.skip_children = true;
  }

  pub fn stop(&mut self) {
    self.stop = true;
  }
}

/// An enter/exit visitor over a [`TraversalGraph`].
///
/// Enter returns the context value passed to the node's children, letting
/// callers accumulate ancestor information (e.g. "inside an async boundary")
/// without shared mutable state. Exit runs after all of a node's children
/// have been visited or skipped.
pub trait GraphVisitor<N, C> {
  fn enter(&mut self, node: N, context: Option<&C>, actions: &mut TraversalActions) -> C;

  fn exit(&mut self, _node: N) {}
}

/// Adapter so a bare closure can be used where only enter matters.
impl<N, C, F> GraphVisitor<N, C> for F
where
  F: FnMut(N, Option<&C>, &mut TraversalActions) -> C,
{
  fn enter(&mut self, node: N, context: Option<&C>, actions: &mut TraversalActions) -> C {
    self(node, context, actions)
  }
}

/// An enter/exit pair built from two closures.
pub struct EnterExit<FEnter, FExit> {
  pub enter: FEnter,
  pub exit: FExit,
}

impl<N, C, FEnter, FExit> GraphVisitor<N, C> for EnterExit<FEnter, FExit>
where
  FEnter: FnMut(N, Option<&C>, &mut TraversalActions) -> C,
  FExit: FnMut(N),
{
  fn enter(&mut self, node: N, context: Option<&C>, actions: &mut TraversalActions) -> C {
    (self.enter)(node, context, actions)
  }

  fn exit(&mut self, node: N) {
    (self.exit)(node);
  }
}

enum Frame<N, C> {
  Enter(N, Option<Rc<C>>),
  Exit(N),
}

/// Depth-first walk with parent-to-child context propagation.
///
/// Cycles are legal: a node currently on the traversal stack is skipped
/// outright rather than re-entered. A node that already completed on another
/// path has enter (and exit) re-invoked with the new parent context, but its
/// subtree is not expanded again, so diamonds stay linear.
///
/// Uses an explicit stack; graph depth never touches the call stack.
pub fn traverse<G, V, C>(graph: &G, roots: impl IntoIterator<Item = G::NodeId>, visitor: &mut V)
where
  G: TraversalGraph,
  V: GraphVisitor<G::NodeId, C>,
{
  let mut stack: Vec<Frame<G::NodeId, C>> = Vec::new();
  let mut visited: HashSet<G::NodeId> = HashSet::new();
  let mut on_stack: HashSet<G::NodeId> = HashSet::new();

  let mut roots: Vec<_> = roots.into_iter().collect();
  roots.reverse();
  for root in roots {
    stack.push(Frame::Enter(root, None));
  }

  while let Some(frame) = stack.pop() {
    match frame {
      Frame::Enter(node, parent_context) => {
        if on_stack.contains(&node) {
          // In-progress ancestor: cycle guard.
          continue;
        }

        let mut actions = TraversalActions::default();
        let context = visitor.enter(node.clone(), parent_context.as_deref(), &mut actions);
        if actions.stop {
          return;
        }

        if actions.skip_children || visited.contains(&node) {
          visitor.exit(node);
          continue;
        }

        visited.insert(node.clone());
        on_stack.insert(node.clone());
        stack.push(Frame::Exit(node.clone()));

        let context = Rc::new(context);
        let mut children = graph.children(node);
        children.reverse();
        for child in children {
          stack.push(Frame::Enter(child, Some(Rc::clone(&context))));
        }
      }
      Frame::Exit(node) => {
        on_stack.remove(&node);
        visitor.exit(node);
      }
    }
  }
}
