//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 双向链表实现
//!
//! 参考 Linux: include/linux/list.h
//!
//! 用途：
//! - 调度队列: 运行队列的哨兵节点
//! - 等待队列: 等待子进程、等待终端输入（每个终端一条）
//!
//! 设计特点：
//! - 侵入式链表：每个任务槽位恰好拥有一个节点，节点所在的链表就是它唯一的队列归属
//! - 索引代替指针：所有节点和哨兵放在同一个数组里，`next`/`prev` 是数组下标
//! - 空链表的哨兵指向自己；从链表摘下的节点同样指向自己（对应 list_del_init）

/// 单个节点的前后链接
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Link {
    /// 下一个节点
    next: usize,
    /// 前一个节点
    prev: usize,
}

/// 节点池
///
/// `N` 个节点中，哪些是哨兵（链表头）、哪些是元素由使用者约定。
pub struct ListArena<const N: usize> {
    links: [Link; N],
}

impl<const N: usize> ListArena<N> {
    /// 创建节点池，所有节点初始化为自引用（对应 INIT_LIST_HEAD）
    pub const fn new() -> Self {
        let mut links = [Link { next: 0, prev: 0 }; N];
        let mut i = 0;
        while i < N {
            links[i] = Link { next: i, prev: i };
            i += 1;
        }
        Self { links }
    }

    /// 重新初始化单个节点
    pub fn init(&mut self, node: usize) {
        self.links[node] = Link { next: node, prev: node };
    }

    /// 检查以 `head` 为哨兵的链表是否为空
    pub fn is_empty(&self, head: usize) -> bool {
        self.links[head].next == head
    }

    /// 节点当前是否挂在某条链表上
    pub fn is_linked(&self, node: usize) -> bool {
        self.links[node].next != node
    }

    /// 在两个相邻节点之间插入 `node`（对应 __list_add）
    fn insert_between(&mut self, node: usize, prev: usize, next: usize) {
        debug_assert!(!self.is_linked(node), "list: node {} is already linked", node);
        self.links[node] = Link { next, prev };
        self.links[prev].next = node;
        self.links[next].prev = node;
    }

    /// 在 `head` 之后插入节点（对应 list_add）
    pub fn add(&mut self, node: usize, head: usize) {
        let next = self.links[head].next;
        self.insert_between(node, head, next);
    }

    /// 在 `head` 之前插入节点，即链表尾部（对应 list_add_tail）
    pub fn add_tail(&mut self, node: usize, head: usize) {
        let prev = self.links[head].prev;
        self.insert_between(node, prev, head);
    }

    /// 从链表中删除节点，删除后节点指向自己（对应 list_del_init）
    pub fn del(&mut self, node: usize) {
        let Link { next, prev } = self.links[node];
        self.links[next].prev = prev;
        self.links[prev].next = next;
        self.init(node);
    }

    /// 把节点移到另一条链表的头部（对应 list_move）
    pub fn move_to(&mut self, node: usize, head: usize) {
        self.del(node);
        self.add(node, head);
    }

    /// 把节点移到另一条链表的尾部（对应 list_move_tail）
    ///
    /// 节点已经在该链表尾部时什么也不做（包括唯一元素的情形，哨兵的自引用不会被破坏）。
    pub fn move_tail(&mut self, node: usize, head: usize) {
        if self.links[head].prev == node {
            return;
        }
        self.del(node);
        self.add_tail(node, head);
    }

    /// 第一个元素
    pub fn first(&self, head: usize) -> Option<usize> {
        let next = self.links[head].next;
        (next != head).then_some(next)
    }

    /// 最后一个元素
    pub fn last(&self, head: usize) -> Option<usize> {
        let prev = self.links[head].prev;
        (prev != head).then_some(prev)
    }

    /// 遍历链表（对应 list_for_each）
    pub fn iter(&self, head: usize) -> ListIter<'_, N> {
        ListIter {
            arena: self,
            head,
            cursor: self.links[head].next,
        }
    }

    /// 元素个数
    pub fn len(&self, head: usize) -> usize {
        self.iter(head).count()
    }

    /// `node` 是否在 `head` 链表上
    pub fn contains(&self, head: usize, node: usize) -> bool {
        self.iter(head).any(|n| n == node)
    }
}

impl<const N: usize> Default for ListArena<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// 链表迭代器
pub struct ListIter<'a, const N: usize> {
    arena: &'a ListArena<N>,
    head: usize,
    cursor: usize,
}

impl<const N: usize> Iterator for ListIter<'_, N> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.cursor == self.head {
            return None;
        }
        let node = self.cursor;
        self.cursor = self.arena.links[node].next;
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAD: usize = 4;
    const OTHER: usize = 5;

    fn collect(arena: &ListArena<6>, head: usize) -> Vec<usize> {
        arena.iter(head).collect()
    }

    #[test]
    fn test_list_init() {
        let arena = ListArena::<6>::new();
        assert!(arena.is_empty(HEAD));
        assert!(!arena.is_linked(0));
        assert_eq!(arena.first(HEAD), None);
        assert_eq!(arena.last(HEAD), None);
    }

    #[test]
    fn test_list_add() {
        let mut arena = ListArena::<6>::new();
        arena.add(0, HEAD);
        arena.add(1, HEAD);

        // head -> 1 -> 0 -> head
        assert_eq!(collect(&arena, HEAD), [1, 0]);
        assert_eq!(arena.first(HEAD), Some(1));
        assert_eq!(arena.last(HEAD), Some(0));
    }

    #[test]
    fn test_list_add_tail() {
        let mut arena = ListArena::<6>::new();
        arena.add_tail(0, HEAD);
        arena.add_tail(1, HEAD);
        arena.add_tail(2, HEAD);

        assert_eq!(collect(&arena, HEAD), [0, 1, 2]);
        assert_eq!(arena.len(HEAD), 3);
        assert!(arena.contains(HEAD, 2));
        assert!(!arena.contains(HEAD, 3));
    }

    #[test]
    fn test_list_del() {
        let mut arena = ListArena::<6>::new();
        arena.add(0, HEAD);
        assert!(!arena.is_empty(HEAD));

        arena.del(0);

        assert!(arena.is_empty(HEAD));
        assert!(!arena.is_linked(0));
    }

    #[test]
    fn test_list_move_between_lists() {
        let mut arena = ListArena::<6>::new();
        arena.add_tail(0, HEAD);
        arena.add_tail(1, HEAD);
        arena.add_tail(2, HEAD);

        arena.move_tail(1, OTHER);
        assert_eq!(collect(&arena, HEAD), [0, 2]);
        assert_eq!(collect(&arena, OTHER), [1]);

        // 来回一圈后形状复原，没有重复也没有孤儿节点
        arena.del(1);
        arena.add(1, HEAD);
        arena.move_tail(0, HEAD);
        arena.move_to(0, HEAD);
        assert_eq!(collect(&arena, HEAD), [0, 1, 2]);
        assert!(arena.is_empty(OTHER));
    }

    #[test]
    fn test_move_tail_single_element() {
        let mut arena = ListArena::<6>::new();
        arena.add(3, HEAD);

        arena.move_tail(3, HEAD);

        assert_eq!(collect(&arena, HEAD), [3]);
        assert_eq!(arena.first(HEAD), Some(3));
        assert_eq!(arena.last(HEAD), Some(3));
    }
}
